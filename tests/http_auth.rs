use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use jewelry_storefront_api::{
    entity::users::Role,
    middleware::auth::AuthPolicy,
    routes,
    services::{
        auth_service::issue_token,
        notification_service::{LogMailer, Notifier},
    },
    state::AppState,
};
use sea_orm::DatabaseConnection;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "router-test-secret";

// Auth is resolved before any database access, so a disconnected pool is enough.
fn app() -> axum::Router {
    routes::app(AppState {
        orm: DatabaseConnection::Disconnected,
        auth: Arc::new(AuthPolicy::Enforce {
            secret: SECRET.into(),
        }),
        notifier: Notifier::new(Arc::new(LogMailer), "Test Jewelers"),
    })
}

#[tokio::test]
async fn placing_an_order_without_a_token_is_unauthorized() {
    let body = serde_json::json!({
        "items": [{ "productId": Uuid::new_v4(), "quantity": 1, "price": "10.00" }],
        "shippingAddress": "1 Main St",
        "paymentMethod": "card",
        "subtotal": "10.00",
        "total": "10.00"
    });
    let response = app()
        .oneshot(
            Request::post("/api/orders")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_bearer_token_is_unauthorized() {
    let response = app()
        .oneshot(
            Request::get("/api/orders")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customers_cannot_open_the_seller_dashboard() {
    let token = issue_token(SECRET, Uuid::new_v4(), Role::Customer).unwrap();
    let response = app()
        .oneshot(
            Request::get("/api/dashboard/stats")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_paths_fall_back_to_not_found() {
    let response = app()
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
}
