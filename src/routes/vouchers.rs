use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::vouchers::{
        CreateVoucherRequest, UpdateVoucherRequest, ValidateVoucherRequest,
        VoucherList, VoucherValidationResponse,
    },
    error::AppResult,
    middleware::auth::Principal,
    models::Voucher,
    response::ApiResponse,
    services::voucher_service,
    state::AppState,
};

/// Public voucher endpoints, mounted at `/api/vouchers`.
pub fn router() -> Router<AppState> {
    Router::new().route("/validate", post(validate_voucher))
}

/// Seller voucher management, mounted at `/api/dashboard/vouchers`.
pub fn dashboard_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_vouchers).post(create_voucher))
        .route(
            "/{id}",
            get(get_voucher).put(update_voucher).delete(delete_voucher),
        )
}

#[utoipa::path(
    post,
    path = "/api/vouchers/validate",
    request_body = ValidateVoucherRequest,
    responses(
        (status = 200, description = "Validation outcome; check `success`", body = VoucherValidationResponse)
    ),
    tag = "Vouchers"
)]
pub async fn validate_voucher(
    State(state): State<AppState>,
    Json(payload): Json<ValidateVoucherRequest>,
) -> AppResult<Json<VoucherValidationResponse>> {
    let resp = voucher_service::validate_voucher(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/vouchers",
    responses(
        (status = 200, description = "Seller vouchers", body = ApiResponse<VoucherList>),
        (status = 403, description = "Seller role required")
    ),
    security(("bearer_auth" = [])),
    tag = "Vouchers"
)]
pub async fn list_vouchers(
    State(state): State<AppState>,
    user: Principal,
) -> AppResult<Json<ApiResponse<VoucherList>>> {
    let resp = voucher_service::list_vouchers(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/vouchers/{id}",
    params(
        ("id" = Uuid, Path, description = "Voucher ID")
    ),
    responses(
        (status = 200, description = "Voucher", body = ApiResponse<Voucher>),
        (status = 404, description = "Voucher not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vouchers"
)]
pub async fn get_voucher(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Voucher>>> {
    let resp = voucher_service::get_voucher(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/vouchers",
    request_body = CreateVoucherRequest,
    responses(
        (status = 201, description = "Create voucher", body = ApiResponse<Voucher>),
        (status = 400, description = "Invalid voucher or duplicate code")
    ),
    security(("bearer_auth" = [])),
    tag = "Vouchers"
)]
pub async fn create_voucher(
    State(state): State<AppState>,
    user: Principal,
    Json(payload): Json<CreateVoucherRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Voucher>>)> {
    let resp = voucher_service::create_voucher(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/vouchers/{id}",
    params(
        ("id" = Uuid, Path, description = "Voucher ID")
    ),
    request_body = UpdateVoucherRequest,
    responses(
        (status = 200, description = "Updated voucher", body = ApiResponse<Voucher>),
        (status = 404, description = "Voucher not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vouchers"
)]
pub async fn update_voucher(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVoucherRequest>,
) -> AppResult<Json<ApiResponse<Voucher>>> {
    let resp = voucher_service::update_voucher(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/dashboard/vouchers/{id}",
    params(
        ("id" = Uuid, Path, description = "Voucher ID")
    ),
    responses(
        (status = 200, description = "Deleted, or deactivated when already redeemed"),
        (status = 404, description = "Voucher not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vouchers"
)]
pub async fn delete_voucher(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = voucher_service::delete_voucher(&state, &user, id).await?;
    Ok(Json(resp))
}
