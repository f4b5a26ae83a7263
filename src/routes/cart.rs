use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::cart::{CartQuote, CartQuoteRequest},
    error::AppResult,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/quote", post(quote_cart))
}

#[utoipa::path(
    post,
    path = "/api/cart/quote",
    request_body = CartQuoteRequest,
    responses(
        (status = 200, description = "Cart priced from live catalog data", body = ApiResponse<CartQuote>),
        (status = 400, description = "Unavailable product or insufficient stock")
    ),
    tag = "Cart"
)]
pub async fn quote_cart(
    State(state): State<AppState>,
    Json(payload): Json<CartQuoteRequest>,
) -> AppResult<Json<ApiResponse<CartQuote>>> {
    let resp = cart_service::quote(&state, payload).await?;
    Ok(Json(resp))
}
