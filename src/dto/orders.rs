use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::orders::{OrderStatus, PaymentStatus},
    models::{Order, OrderItem},
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price the customer saw when submitting.
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub payment_method: String,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    pub subtotal: Decimal,
    pub total: Decimal,
    #[serde(alias = "notes")]
    pub special_instructions: Option<String>,
    pub voucher_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    /// Recorded alongside the status, e.g. once payment is confirmed offline.
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderWithItems>,
}
