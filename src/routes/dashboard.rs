use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::{
        dashboard::DashboardStats,
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
    },
    error::AppResult,
    middleware::auth::Principal,
    models::Order,
    response::ApiResponse,
    routes::{params::OrderListQuery, vouchers},
    services::dashboard_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/orders", get(list_seller_orders))
        .route("/orders/{id}", get(get_seller_order))
        .route("/orders/{id}/update-status", patch(update_order_status))
        .nest("/vouchers", vouchers::dashboard_router())
}

#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Seller dashboard counters", body = ApiResponse<DashboardStats>),
        (status = 403, description = "Seller role required")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn stats(
    State(state): State<AppState>,
    user: Principal,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    let resp = dashboard_service::stats(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders containing the seller's products", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn list_seller_orders(
    State(state): State<AppState>,
    user: Principal,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = dashboard_service::list_seller_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with the seller's items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn get_seller_order(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = dashboard_service::get_seller_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/dashboard/orders/{id}/update-status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<Order>),
        (status = 400, description = "Illegal status transition"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = dashboard_service::update_order_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
