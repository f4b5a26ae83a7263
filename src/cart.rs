//! In-memory cart state container.
//!
//! The cart lives with the client; the server only rebuilds one to quote
//! totals. Every transition goes through [`Cart::reduce`] and leaves the
//! derived totals consistent with the lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::pricing::VoucherTerms;

/// Per-line quantity ceiling; matches the range of a product's stock.
pub const MAX_LINE_QUANTITY: u32 = i32::MAX as u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub quantity: u32,
    pub material: Option<String>,
    pub category: Option<String>,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedVoucher {
    pub id: Uuid,
    pub code: String,
    #[serde(flatten)]
    pub terms: VoucherTerms,
    /// Discount for the current cart snapshot.
    pub discount_amount: Decimal,
}

#[derive(Debug, Clone)]
pub enum CartAction {
    AddItem(CartItem),
    UpdateQuantity { product_id: Uuid, quantity: i64 },
    RemoveItem(Uuid),
    ApplyVoucher(AppliedVoucher),
    RemoveVoucher,
    Clear,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub voucher: Option<AppliedVoucher>,
    pub original_total: Decimal,
    pub item_count: u32,
    pub total: Decimal,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reduce(&mut self, action: CartAction) {
        match action {
            CartAction::AddItem(item) => self.add_item(item),
            CartAction::UpdateQuantity {
                product_id,
                quantity,
            } => self.update_quantity(product_id, quantity),
            CartAction::RemoveItem(product_id) => self.remove_item(product_id),
            CartAction::ApplyVoucher(voucher) => self.apply_voucher(voucher),
            CartAction::RemoveVoucher => self.remove_voucher(),
            CartAction::Clear => self.clear(),
        }
    }

    /// Adds one unit: bumps an existing line or inserts a new line with quantity 1.
    pub fn add_item(&mut self, item: CartItem) {
        match self.line_mut(item.product_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(1).min(MAX_LINE_QUANTITY),
            None => self.items.push(CartItem { quantity: 1, ..item }),
        }
        self.recalculate();
    }

    /// Negative quantities clamp to zero and zero removes the line.
    /// Quantities above [`MAX_LINE_QUANTITY`] clamp to it.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: i64) {
        let quantity = u32::try_from(quantity.clamp(0, i64::from(MAX_LINE_QUANTITY)))
            .unwrap_or(MAX_LINE_QUANTITY);
        if quantity == 0 {
            self.items.retain(|i| i.product_id != product_id);
        } else if let Some(line) = self.line_mut(product_id) {
            line.quantity = quantity;
        }
        self.recalculate();
    }

    pub fn remove_item(&mut self, product_id: Uuid) {
        self.items.retain(|i| i.product_id != product_id);
        self.recalculate();
    }

    /// Replaces any previously applied voucher.
    pub fn apply_voucher(&mut self, voucher: AppliedVoucher) {
        self.voucher = Some(voucher);
        self.recalculate();
    }

    pub fn remove_voucher(&mut self) {
        self.voucher = None;
        self.recalculate();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn discount_amount(&self) -> Decimal {
        self.voucher
            .as_ref()
            .map(|v| v.discount_amount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn line_mut(&mut self, product_id: Uuid) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|i| i.product_id == product_id)
    }

    fn recalculate(&mut self) {
        self.original_total = self
            .items
            .iter()
            .map(CartItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add);
        self.item_count = self
            .items
            .iter()
            .map(|i| i.quantity)
            .fold(0, u32::saturating_add);

        let original_total = self.original_total;
        // A voucher stays only while the cart still satisfies its minimum.
        if self
            .voucher
            .as_ref()
            .is_some_and(|v| self.items.is_empty() || !v.terms.meets_minimum(original_total))
        {
            self.voucher = None;
        }
        if let Some(voucher) = self.voucher.as_mut() {
            voucher.discount_amount = voucher.terms.discount_for(original_total);
        }

        self.total = (self.original_total - self.discount_amount()).max(Decimal::ZERO);
    }
}
