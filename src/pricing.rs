//! Voucher eligibility and discount arithmetic.
//!
//! Everything here is pure so the same rules apply to the cart quote, the
//! validate endpoint and the order transaction.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::entity::vouchers::{Model as VoucherModel, VoucherKind, VoucherStatus};

/// Largest amount a `NUMERIC(12,2)` money column holds.
pub const MAX_MONEY: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Whether `amount` fits a money column: non-negative, within range, at most cents.
pub fn is_storable_money(amount: Decimal) -> bool {
    amount >= Decimal::ZERO && amount <= MAX_MONEY && amount.round_dp(2) == amount
}

/// Round a money amount to cents, midpoint away from zero (249.995 -> 250.00).
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Why a voucher cannot be used. `Display` is the message shown to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoucherRejection {
    #[error("Invalid or expired voucher code")]
    InvalidOrExpired,

    #[error("Voucher usage limit reached")]
    UsageLimitReached,

    #[error("Minimum order amount of {minimum} required")]
    MinimumNotMet { minimum: Decimal },
}

/// The part of a voucher needed to price an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoucherTerms {
    #[serde(rename = "type")]
    pub kind: VoucherKind,
    pub value: Decimal,
    pub min_order_amount: Decimal,
    pub max_discount: Option<Decimal>,
}

impl From<&VoucherModel> for VoucherTerms {
    fn from(model: &VoucherModel) -> Self {
        Self {
            kind: model.kind,
            value: model.value,
            min_order_amount: model.min_order_amount,
            max_discount: model.max_discount,
        }
    }
}

impl VoucherTerms {
    pub fn meets_minimum(&self, order_amount: Decimal) -> bool {
        order_amount >= self.min_order_amount
    }

    /// Discount for `order_amount`, never negative and never above the amount.
    pub fn discount_for(&self, order_amount: Decimal) -> Decimal {
        if order_amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let raw = match self.kind {
            VoucherKind::Percentage => {
                // Overflow in both orders means the discount exceeds the amount.
                let discount = order_amount
                    .checked_mul(self.value)
                    .map(|d| d / Decimal::ONE_HUNDRED)
                    .or_else(|| (order_amount / Decimal::ONE_HUNDRED).checked_mul(self.value))
                    .unwrap_or(order_amount);
                match self.max_discount {
                    Some(cap) if discount > cap => cap,
                    _ => discount,
                }
            }
            VoucherKind::Fixed => self.value,
        };
        round_money(raw.min(order_amount).max(Decimal::ZERO))
    }
}

/// Run the eligibility checks in order (first failure wins) and price the discount.
pub fn evaluate(
    voucher: &VoucherModel,
    order_amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Decimal, VoucherRejection> {
    let in_window = voucher.start_date.with_timezone(&Utc) <= now
        && now <= voucher.end_date.with_timezone(&Utc);
    if voucher.status != VoucherStatus::Active || !in_window {
        return Err(VoucherRejection::InvalidOrExpired);
    }
    if voucher.used_count >= voucher.usage_limit {
        return Err(VoucherRejection::UsageLimitReached);
    }
    let terms = VoucherTerms::from(voucher);
    if !terms.meets_minimum(order_amount) {
        return Err(VoucherRejection::MinimumNotMet {
            minimum: voucher.min_order_amount,
        });
    }
    Ok(terms.discount_for(order_amount))
}

/// Voucher codes are matched case-insensitively and stored upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn voucher(kind: VoucherKind, value: Decimal) -> VoucherModel {
        let now = Utc::now();
        VoucherModel {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            code: "SAVE10".into(),
            kind,
            value,
            min_order_amount: dec!(100),
            max_discount: None,
            usage_limit: 100,
            used_count: 0,
            status: VoucherStatus::Active,
            start_date: (now - Duration::days(1)).into(),
            end_date: (now + Duration::days(30)).into(),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn percentage_discount_rounds_half_up() {
        let v = voucher(VoucherKind::Percentage, dec!(10));
        let discount = evaluate(&v, dec!(2499.99), Utc::now()).unwrap();
        assert_eq!(discount, dec!(250.00));
        assert_eq!(dec!(2499.99) - discount, dec!(2249.99));
    }

    #[test]
    fn percentage_discount_is_capped_by_max_discount() {
        let mut v = voucher(VoucherKind::Percentage, dec!(20));
        v.max_discount = Some(dec!(50));
        assert_eq!(evaluate(&v, dec!(1000), Utc::now()).unwrap(), dec!(50));
    }

    #[test]
    fn fixed_discount_never_exceeds_order_amount() {
        let mut v = voucher(VoucherKind::Fixed, dec!(500));
        v.min_order_amount = Decimal::ZERO;
        assert_eq!(evaluate(&v, dec!(120.50), Utc::now()).unwrap(), dec!(120.50));
        assert_eq!(evaluate(&v, dec!(900), Utc::now()).unwrap(), dec!(500));
    }

    #[test]
    fn exhausted_voucher_is_rejected_for_any_amount() {
        let mut v = voucher(VoucherKind::Percentage, dec!(10));
        v.used_count = 100;
        for amount in [dec!(0), dec!(150), dec!(100000)] {
            assert_eq!(
                evaluate(&v, amount, Utc::now()),
                Err(VoucherRejection::UsageLimitReached)
            );
        }
        assert_eq!(
            VoucherRejection::UsageLimitReached.to_string(),
            "Voucher usage limit reached"
        );
    }

    #[test]
    fn voucher_outside_window_is_invalid() {
        let v = voucher(VoucherKind::Percentage, dec!(10));
        let later = Utc::now() + Duration::days(31);
        let earlier = Utc::now() - Duration::days(2);
        assert_eq!(evaluate(&v, dec!(500), later), Err(VoucherRejection::InvalidOrExpired));
        assert_eq!(evaluate(&v, dec!(500), earlier), Err(VoucherRejection::InvalidOrExpired));
    }

    #[test]
    fn inactive_voucher_is_invalid_even_when_exhausted() {
        let mut v = voucher(VoucherKind::Percentage, dec!(10));
        v.status = VoucherStatus::Inactive;
        v.used_count = 100;
        assert_eq!(
            evaluate(&v, dec!(500), Utc::now()),
            Err(VoucherRejection::InvalidOrExpired)
        );
    }

    #[test]
    fn minimum_amount_message_names_the_minimum() {
        let v = voucher(VoucherKind::Percentage, dec!(10));
        let err = evaluate(&v, dec!(99.99), Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Minimum order amount of 100 required");
    }

    #[test]
    fn huge_amounts_price_without_overflow() {
        let terms = VoucherTerms::from(&voucher(VoucherKind::Percentage, dec!(10)));
        let discount = terms.discount_for(Decimal::MAX);
        assert!(discount > Decimal::ZERO);
        assert!(discount < Decimal::MAX);

        let fixed = VoucherTerms {
            kind: VoucherKind::Fixed,
            ..terms
        };
        assert_eq!(fixed.discount_for(Decimal::MAX), dec!(10));
    }

    #[test]
    fn storable_money_is_bounded_to_cents() {
        assert_eq!(MAX_MONEY, dec!(9999999999.99));
        assert!(is_storable_money(dec!(2499.99)));
        assert!(is_storable_money(dec!(10.500)));
        assert!(!is_storable_money(dec!(10.505)));
        assert!(!is_storable_money(dec!(-1)));
        assert!(!is_storable_money(MAX_MONEY + dec!(0.01)));
        assert!(!is_storable_money(Decimal::MAX));
    }

    #[test]
    fn codes_are_normalized_to_upper_case() {
        assert_eq!(normalize_code("  save10 "), "SAVE10");
    }

    fn money() -> impl Strategy<Value = Decimal> {
        (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #[test]
        fn percentage_discount_within_bounds(
            amount in money(),
            pct in 1i64..=100,
            cap in proptest::option::of(money()),
        ) {
            let terms = VoucherTerms {
                kind: VoucherKind::Percentage,
                value: Decimal::from(pct),
                min_order_amount: Decimal::ZERO,
                max_discount: cap,
            };
            let discount = terms.discount_for(amount);
            let mut bound = amount * Decimal::from(pct) / Decimal::ONE_HUNDRED;
            if let Some(cap) = cap {
                bound = bound.min(cap);
            }
            prop_assert!(discount >= Decimal::ZERO);
            prop_assert!(discount <= round_money(bound));
            prop_assert!(discount <= amount);
        }

        #[test]
        fn fixed_discount_is_min_of_value_and_amount(amount in money(), value in money()) {
            let terms = VoucherTerms {
                kind: VoucherKind::Fixed,
                value,
                min_order_amount: Decimal::ZERO,
                max_discount: None,
            };
            let expected = if amount <= Decimal::ZERO { Decimal::ZERO } else { value.min(amount) };
            prop_assert_eq!(terms.discount_for(amount), expected);
        }
    }
}
