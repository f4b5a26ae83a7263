use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cart::Cart;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartQuoteLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartQuoteRequest {
    pub items: Vec<CartQuoteLine>,
    pub voucher_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartQuote {
    pub cart: Cart,
    /// Set when a voucher code was supplied but could not be applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_error: Option<String>,
}
