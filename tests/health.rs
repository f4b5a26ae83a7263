use std::sync::Arc;

use axum::extract::State;
use jewelry_storefront_api::{
    middleware::auth::AuthPolicy,
    routes::health::health_check,
    services::notification_service::{LogMailer, Notifier},
    state::AppState,
};
use sea_orm::DatabaseConnection;

fn offline_state() -> AppState {
    AppState {
        orm: DatabaseConnection::Disconnected,
        auth: Arc::new(AuthPolicy::Enforce {
            secret: "test-secret".into(),
        }),
        notifier: Notifier::new(Arc::new(LogMailer), "Test Jewelers"),
    }
}

#[tokio::test]
async fn health_check_reports_database_down_without_failing() {
    let response = health_check(State(offline_state())).await;
    assert!(response.0.success);
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "degraded");
    assert_eq!(data.database, "down");
}
