use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthData {
    pub status: String,
    pub database: String,
}

impl HealthData {
    fn from_ping(db_ok: bool) -> Self {
        let (status, database) = if db_ok {
            ("ok", "up")
        } else {
            ("degraded", "down")
        };
        Self {
            status: status.to_string(),
            database: database.to_string(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service liveness and database reachability", body = ApiResponse<HealthData>),
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    let db_ok = match state.orm.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "database ping failed");
            false
        }
    };

    Json(ApiResponse::success(
        "Health check",
        HealthData::from_ping(db_ok),
        Some(Meta::empty()),
    ))
}
