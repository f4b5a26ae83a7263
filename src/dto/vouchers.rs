use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::{
    entity::vouchers::{VoucherKind, VoucherStatus},
    models::Voucher,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVoucherRequest {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: VoucherKind,
    pub value: Decimal,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: i32,
    pub status: Option<VoucherStatus>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVoucherRequest {
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<VoucherKind>,
    pub value: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    /// Absent keeps the current cap, `null` removes it.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, nullable = true)]
    pub max_discount: Option<Option<Decimal>>,
    pub usage_limit: Option<i32>,
    pub status: Option<VoucherStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoucherList {
    pub items: Vec<Voucher>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateVoucherRequest {
    pub code: String,
    pub order_amount: Decimal,
}

/// Always returned with 200: either `{success:false, error}` or
/// `{success:true, voucher, discountAmount}`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoucherValidationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher: Option<Voucher>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Decimal>,
}

impl VoucherValidationResponse {
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            voucher: None,
            discount_amount: None,
        }
    }

    pub fn accepted(voucher: Voucher, discount_amount: Decimal) -> Self {
        Self {
            success: true,
            error: None,
            voucher: Some(voucher),
            discount_amount: Some(discount_amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parse(body: &str) -> UpdateVoucherRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn max_discount_distinguishes_absent_null_and_value() {
        assert_eq!(parse("{}").max_discount, None);
        assert_eq!(parse(r#"{"maxDiscount":null}"#).max_discount, Some(None));
        assert_eq!(
            parse(r#"{"maxDiscount":"25.00"}"#).max_discount,
            Some(Some(dec!(25.00)))
        );
    }
}
