use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
    sea_query::{Expr, LockType},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::vouchers::{
        CreateVoucherRequest, UpdateVoucherRequest, ValidateVoucherRequest,
        VoucherList, VoucherValidationResponse,
    },
    entity::vouchers::{
        ActiveModel, Column, Entity as Vouchers, Model as VoucherModel, VoucherKind, VoucherStatus,
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::Voucher,
    pricing::{self, VoucherRejection},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Look up by normalized code and evaluate against `order_amount`.
///
/// Pure read: usage is only recorded by [`redeem`] inside the order transaction.
pub async fn check_voucher<C: ConnectionTrait>(
    db: &C,
    code: &str,
    order_amount: Decimal,
    now: DateTime<Utc>,
) -> AppResult<Result<(VoucherModel, Decimal), VoucherRejection>> {
    let code = pricing::normalize_code(code);
    if code.is_empty() {
        return Ok(Err(VoucherRejection::InvalidOrExpired));
    }
    let voucher = Vouchers::find()
        .filter(Column::Code.eq(code))
        .one(db)
        .await?;
    Ok(match voucher {
        Some(voucher) => pricing::evaluate(&voucher, order_amount, now).map(|d| (voucher, d)),
        None => Err(VoucherRejection::InvalidOrExpired),
    })
}

pub async fn validate_voucher(
    state: &AppState,
    payload: ValidateVoucherRequest,
) -> AppResult<VoucherValidationResponse> {
    if payload.order_amount < Decimal::ZERO {
        return Ok(VoucherValidationResponse::rejected(
            "Order amount must not be negative",
        ));
    }
    if payload.order_amount > pricing::MAX_MONEY {
        return Ok(VoucherValidationResponse::rejected("Order amount is out of range"));
    }
    let outcome = check_voucher(&state.orm, &payload.code, payload.order_amount, Utc::now()).await?;
    Ok(match outcome {
        Ok((voucher, discount)) => {
            tracing::debug!(code = %voucher.code, %discount, "voucher accepted");
            VoucherValidationResponse::accepted(Voucher::from(voucher), discount)
        }
        Err(rejection) => {
            tracing::debug!(code = %payload.code, reason = %rejection, "voucher rejected");
            VoucherValidationResponse::rejected(rejection.to_string())
        }
    })
}

/// Re-validate under a row lock and consume one use. Must run inside the
/// order transaction so a failed order never consumes a use and concurrent
/// checkouts cannot push `used_count` past `usage_limit`.
pub async fn redeem<C: ConnectionTrait>(
    txn: &C,
    code: &str,
    order_amount: Decimal,
    now: DateTime<Utc>,
) -> AppResult<(VoucherModel, Decimal)> {
    let code = pricing::normalize_code(code);
    let voucher = Vouchers::find()
        .filter(Column::Code.eq(code))
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::bad_request(VoucherRejection::InvalidOrExpired.to_string()))?;

    let discount = pricing::evaluate(&voucher, order_amount, now)
        .map_err(|rejection| AppError::bad_request(rejection.to_string()))?;

    let result = Vouchers::update_many()
        .col_expr(Column::UsedCount, Expr::col(Column::UsedCount).add(1))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(voucher.id))
        .filter(Expr::col(Column::UsedCount).lt(Expr::col(Column::UsageLimit)))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::bad_request(
            VoucherRejection::UsageLimitReached.to_string(),
        ));
    }

    Ok((voucher, discount))
}

pub async fn list_vouchers(
    state: &AppState,
    user: &Principal,
) -> AppResult<ApiResponse<VoucherList>> {
    let seller_id = state.auth.require_seller(user)?;
    let items: Vec<Voucher> = Vouchers::find()
        .filter(Column::SellerId.eq(seller_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Voucher::from)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Vouchers",
        VoucherList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_voucher(
    state: &AppState,
    user: &Principal,
    id: Uuid,
) -> AppResult<ApiResponse<Voucher>> {
    let seller_id = state.auth.require_seller(user)?;
    let voucher = find_owned(state, seller_id, id).await?;
    Ok(ApiResponse::success("Voucher", Voucher::from(voucher), None))
}

pub async fn create_voucher(
    state: &AppState,
    user: &Principal,
    payload: CreateVoucherRequest,
) -> AppResult<ApiResponse<Voucher>> {
    let seller_id = state.auth.require_seller(user)?;
    let code = pricing::normalize_code(&payload.code);
    let terms = VoucherDraft {
        code: &code,
        kind: payload.kind,
        value: payload.value,
        min_order_amount: payload.min_order_amount,
        max_discount: payload.max_discount,
        usage_limit: payload.usage_limit,
        used_count: 0,
        start_date: payload.start_date,
        end_date: payload.end_date,
    };
    terms.validate()?;
    ensure_unique_code(state, &code, None).await?;

    let now = Utc::now();
    let voucher = ActiveModel {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller_id),
        code: Set(code),
        kind: Set(payload.kind),
        value: Set(payload.value),
        min_order_amount: Set(payload.min_order_amount),
        max_discount: Set(payload.max_discount),
        usage_limit: Set(payload.usage_limit),
        used_count: Set(0),
        status: Set(payload.status.unwrap_or(VoucherStatus::Active)),
        start_date: Set(payload.start_date.into()),
        end_date: Set(payload.end_date.into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        seller_id,
        "voucher_create",
        "vouchers",
        serde_json::json!({ "voucher_id": voucher.id, "code": voucher.code }),
    )
    .await;

    Ok(ApiResponse::success(
        "Voucher created",
        Voucher::from(voucher),
        Some(Meta::empty()),
    ))
}

pub async fn update_voucher(
    state: &AppState,
    user: &Principal,
    id: Uuid,
    payload: UpdateVoucherRequest,
) -> AppResult<ApiResponse<Voucher>> {
    let seller_id = state.auth.require_seller(user)?;
    let existing = find_owned(state, seller_id, id).await?;

    let code = payload
        .code
        .as_deref()
        .map(pricing::normalize_code)
        .unwrap_or_else(|| existing.code.clone());
    let merged = VoucherDraft {
        code: &code,
        kind: payload.kind.unwrap_or(existing.kind),
        value: payload.value.unwrap_or(existing.value),
        min_order_amount: payload.min_order_amount.unwrap_or(existing.min_order_amount),
        max_discount: payload.max_discount.unwrap_or(existing.max_discount),
        usage_limit: payload.usage_limit.unwrap_or(existing.usage_limit),
        used_count: existing.used_count,
        start_date: payload
            .start_date
            .unwrap_or_else(|| existing.start_date.with_timezone(&Utc)),
        end_date: payload
            .end_date
            .unwrap_or_else(|| existing.end_date.with_timezone(&Utc)),
    };
    merged.validate()?;
    if code != existing.code {
        ensure_unique_code(state, &code, Some(id)).await?;
    }

    let mut active: ActiveModel = existing.into();
    active.kind = Set(merged.kind);
    active.value = Set(merged.value);
    active.min_order_amount = Set(merged.min_order_amount);
    active.max_discount = Set(merged.max_discount);
    active.usage_limit = Set(merged.usage_limit);
    active.start_date = Set(merged.start_date.into());
    active.end_date = Set(merged.end_date.into());
    active.code = Set(code);
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    active.updated_at = Set(Utc::now().into());
    let voucher = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        seller_id,
        "voucher_update",
        "vouchers",
        serde_json::json!({ "voucher_id": voucher.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Voucher updated",
        Voucher::from(voucher),
        Some(Meta::empty()),
    ))
}

pub async fn delete_voucher(
    state: &AppState,
    user: &Principal,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let seller_id = state.auth.require_seller(user)?;
    let voucher = find_owned(state, seller_id, id).await?;

    // Redeemed vouchers stay referenced by orders; retire them instead.
    if voucher.used_count > 0 {
        let mut active: ActiveModel = voucher.into();
        active.status = Set(VoucherStatus::Inactive);
        active.updated_at = Set(Utc::now().into());
        active.update(&state.orm).await?;
    } else {
        Vouchers::delete_by_id(id).exec(&state.orm).await?;
    }

    audit::record(
        &state.orm,
        seller_id,
        "voucher_delete",
        "vouchers",
        serde_json::json!({ "voucher_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn find_owned(state: &AppState, seller_id: Uuid, id: Uuid) -> AppResult<VoucherModel> {
    Vouchers::find_by_id(id)
        .filter(Column::SellerId.eq(seller_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn ensure_unique_code(state: &AppState, code: &str, except: Option<Uuid>) -> AppResult<()> {
    let mut finder = Vouchers::find().filter(Column::Code.eq(code));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    if finder.count(&state.orm).await? > 0 {
        return Err(AppError::bad_request("Voucher code already exists"));
    }
    Ok(())
}

struct VoucherDraft<'a> {
    code: &'a str,
    kind: VoucherKind,
    value: Decimal,
    min_order_amount: Decimal,
    max_discount: Option<Decimal>,
    usage_limit: i32,
    used_count: i32,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

impl VoucherDraft<'_> {
    fn validate(&self) -> AppResult<()> {
        if self.code.is_empty() {
            return Err(AppError::bad_request("Voucher code is required"));
        }
        if self.value <= Decimal::ZERO {
            return Err(AppError::bad_request("Voucher value must be greater than 0"));
        }
        if self.kind == VoucherKind::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err(AppError::bad_request(
                "Percentage voucher value must not exceed 100",
            ));
        }
        if self.min_order_amount < Decimal::ZERO {
            return Err(AppError::bad_request("Minimum order amount must not be negative"));
        }
        if self.max_discount.is_some_and(|m| m <= Decimal::ZERO) {
            return Err(AppError::bad_request("Maximum discount must be greater than 0"));
        }
        let amounts = [Some(self.value), Some(self.min_order_amount), self.max_discount];
        if !amounts.into_iter().flatten().all(pricing::is_storable_money) {
            return Err(AppError::bad_request("Voucher amounts are out of range"));
        }
        if self.usage_limit < self.used_count.max(0) {
            return Err(AppError::bad_request(
                "Usage limit must not be below the times already used",
            ));
        }
        if self.start_date > self.end_date {
            return Err(AppError::bad_request("Start date must be before end date"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn draft(kind: VoucherKind, value: Decimal) -> VoucherDraft<'static> {
        VoucherDraft {
            code: "SAVE10",
            kind,
            value,
            min_order_amount: dec!(100),
            max_discount: None,
            usage_limit: 100,
            used_count: 0,
            start_date: Utc::now(),
            end_date: Utc::now() + Duration::days(7),
        }
    }

    #[test]
    fn accepts_well_formed_vouchers() {
        assert!(draft(VoucherKind::Percentage, dec!(10)).validate().is_ok());
        assert!(draft(VoucherKind::Fixed, dec!(500)).validate().is_ok());
    }

    #[test]
    fn rejects_percentages_above_one_hundred() {
        assert!(draft(VoucherKind::Percentage, dec!(150)).validate().is_err());
    }

    #[test]
    fn rejects_inverted_date_range() {
        let mut d = draft(VoucherKind::Fixed, dec!(5));
        d.end_date = d.start_date - Duration::days(1);
        assert!(d.validate().is_err());
    }

    #[test]
    fn rejects_amounts_that_do_not_fit_money_columns() {
        assert!(draft(VoucherKind::Fixed, Decimal::MAX).validate().is_err());
        assert!(draft(VoucherKind::Fixed, dec!(5.005)).validate().is_err());
        let mut d = draft(VoucherKind::Percentage, dec!(10));
        d.max_discount = Some(dec!(10000000000));
        assert!(d.validate().is_err());
    }

    #[test]
    fn rejects_limit_below_usage() {
        let mut d = draft(VoucherKind::Fixed, dec!(5));
        d.used_count = 10;
        d.usage_limit = 5;
        assert!(d.validate().is_err());
    }
}
