use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    cart::{AppliedVoucher, Cart, CartAction, CartItem},
    dto::cart::{CartQuote, CartQuoteLine, CartQuoteRequest},
    error::{AppError, AppResult},
    pricing::VoucherTerms,
    response::{ApiResponse, Meta},
    services::voucher_service,
    state::AppState,
};

#[derive(Debug, FromRow)]
struct CartProductRow {
    id: Uuid,
    name: String,
    price: Decimal,
    stock: i32,
    status: String,
    images: String,
    material: Option<String>,
    category: Option<String>,
}

impl CartProductRow {
    fn to_cart_item(&self) -> CartItem {
        let image = self
            .images
            .split(',')
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string);
        CartItem {
            product_id: self.id,
            name: self.name.clone(),
            price: self.price,
            image,
            quantity: 1,
            material: self.material.clone(),
            category: self.category.clone(),
        }
    }
}

/// Rebuilds a cart from live catalog prices and prices it, voucher included.
/// Nothing is persisted.
pub async fn quote(state: &AppState, payload: CartQuoteRequest) -> AppResult<ApiResponse<CartQuote>> {
    let lines = merge_lines(&payload.items);
    let ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();

    let rows = if ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as::<_, CartProductRow>(
            r#"
            SELECT p.id, p.name, p.price, p.stock, p.status, p.images,
                   m.name AS material, c.name AS category
            FROM products p
            LEFT JOIN materials m ON m.id = p.material_id
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE p.id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(state.orm.get_postgres_connection_pool())
        .await?
    };
    let products: HashMap<Uuid, CartProductRow> = rows.into_iter().map(|r| (r.id, r)).collect();

    let mut cart = Cart::new();
    for (product_id, quantity) in lines {
        let product = products
            .get(&product_id)
            .filter(|p| p.status == "ACTIVE")
            .ok_or_else(|| AppError::bad_request("Some items are no longer available"))?;
        if i64::from(quantity) > i64::from(product.stock) {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}. Available: {}",
                product.name, product.stock
            )));
        }
        cart.reduce(CartAction::AddItem(product.to_cart_item()));
        cart.reduce(CartAction::UpdateQuantity {
            product_id,
            quantity: i64::from(quantity),
        });
    }

    let mut voucher_error = None;
    if let Some(code) = payload.voucher_code.as_deref().filter(|c| !c.trim().is_empty()) {
        if cart.is_empty() {
            voucher_error = Some("Cart is empty".to_string());
        } else {
            match voucher_service::check_voucher(&state.orm, code, cart.original_total, Utc::now())
                .await?
            {
                Ok((voucher, discount)) => cart.reduce(CartAction::ApplyVoucher(AppliedVoucher {
                    id: voucher.id,
                    terms: VoucherTerms::from(&voucher),
                    code: voucher.code,
                    discount_amount: discount,
                })),
                Err(rejection) => voucher_error = Some(rejection.to_string()),
            }
        }
    }

    Ok(ApiResponse::success(
        "Cart quote",
        CartQuote {
            cart,
            voucher_error,
        },
        Some(Meta::empty()),
    ))
}

/// Sums quantities of repeated products, keeping first-seen order and
/// dropping zero-quantity lines.
fn merge_lines(lines: &[CartQuoteLine]) -> Vec<(Uuid, u32)> {
    let mut merged: Vec<(Uuid, u32)> = Vec::new();
    for line in lines.iter().filter(|l| l.quantity > 0) {
        match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty = qty.saturating_add(line.quantity),
            None => merged.push((line.product_id, line.quantity)),
        }
    }
    merged
}
