use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_vouchers: i64,
    pub active_vouchers: i64,
    pub total_orders: i64,
    pub pending_orders: i64,
    pub total_revenue: Decimal,
    pub total_products: i64,
    pub active_products: i64,
}
