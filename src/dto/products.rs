use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{entity::products::ProductStatus, models::Product};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub status: Option<ProductStatus>,
    pub category_id: Option<Uuid>,
    pub material_id: Option<Uuid>,
    #[serde(default)]
    pub featured: bool,
    /// Comma-joined image URLs.
    #[serde(default)]
    pub images: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub status: Option<ProductStatus>,
    pub category_id: Option<Uuid>,
    pub material_id: Option<Uuid>,
    pub featured: Option<bool>,
    pub images: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}
