use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    categories::Model as CategoryModel,
    materials::Model as MaterialModel,
    order_items::Model as OrderItemModel,
    orders::{Model as OrderModel, OrderStatus, PaymentStatus},
    products::{Model as ProductModel, ProductStatus},
    users::{Model as UserModel, Role},
    vouchers::{Model as VoucherModel, VoucherKind, VoucherStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<UserModel> for User {
    fn from(model: UserModel) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub category_id: Option<Uuid>,
    pub material_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub status: ProductStatus,
    pub featured: bool,
    pub images: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductModel> for Product {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            seller_id: model.seller_id,
            category_id: model.category_id,
            material_id: model.material_id,
            name: model.name,
            description: model.description,
            price: model.price,
            stock: model.stock,
            status: model.status,
            featured: model.featured,
            images: model.images,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn from_entity(model: CategoryModel, product_count: i64) -> Self {
        Self {
            id: model.id,
            seller_id: model.seller_id,
            name: model.name,
            description: model.description,
            is_active: model.is_active,
            product_count,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    pub fn from_entity(model: MaterialModel, product_count: i64) -> Self {
        Self {
            id: model.id,
            seller_id: model.seller_id,
            name: model.name,
            description: model.description,
            is_active: model.is_active,
            product_count,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: VoucherKind,
    pub value: Decimal,
    pub min_order_amount: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: i32,
    pub used_count: i32,
    pub status: VoucherStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VoucherModel> for Voucher {
    fn from(model: VoucherModel) -> Self {
        Self {
            id: model.id,
            seller_id: model.seller_id,
            code: model.code,
            kind: model.kind,
            value: model.value,
            min_order_amount: model.min_order_amount,
            max_discount: model.max_discount,
            usage_limit: model.usage_limit,
            used_count: model.used_count,
            status: model.status,
            start_date: model.start_date.with_timezone(&Utc),
            end_date: model.end_date.with_timezone(&Utc),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub voucher_code: Option<String>,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub payment_method: String,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderModel> for Order {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            status: model.status,
            payment_status: model.payment_status,
            subtotal: model.subtotal,
            discount_amount: model.discount_amount,
            voucher_code: model.voucher_code,
            shipping_cost: model.shipping_cost,
            tax: model.tax,
            total: model.total,
            shipping_address: model.shipping_address,
            billing_address: model.billing_address,
            payment_method: model.payment_method,
            tracking_number: model.tracking_number,
            notes: model.notes,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn from_entity(model: OrderItemModel, product_name: Option<String>) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_name,
            quantity: model.quantity,
            price: model.price,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}
