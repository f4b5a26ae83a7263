use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    config::AppConfig, middleware::auth::AuthPolicy, services::notification_service::Notifier,
};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub auth: Arc<AuthPolicy>,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(orm: DatabaseConnection, config: &AppConfig) -> Self {
        Self {
            orm,
            auth: Arc::new(AuthPolicy::from_config(config)),
            notifier: Notifier::from_config(config),
        }
    }
}
