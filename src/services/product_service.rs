use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        products::{ActiveModel, Column, Entity as Products, ProductStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::Product,
    pricing,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::{category_service, material_service},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }
    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }
    if let Some(material_id) = query.material_id {
        condition = condition.add(Column::MaterialId.eq(material_id));
    }
    if let Some(seller_id) = query.seller_id {
        condition = condition.add(Column::SellerId.eq(seller_id));
    }
    if let Some(featured) = query.featured {
        condition = condition.add(Column::Featured.eq(featured));
    }
    // Hidden products only show up when asked for explicitly.
    condition = match query.status {
        Some(status) => condition.add(Column::Status.eq(status)),
        None => condition.add(
            Column::Status.is_in([ProductStatus::Active, ProductStatus::OutOfStock]),
        ),
    };
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Stock => Column::Stock,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", Product::from(product), None))
}

pub async fn create_product(
    state: &AppState,
    user: &Principal,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let seller_id = state.auth.require_seller(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    validate_price(payload.price)?;
    validate_stock(payload.stock)?;
    check_references(state, seller_id, payload.category_id, payload.material_id).await?;

    let status = reconcile_status(
        payload.status.unwrap_or(ProductStatus::Active),
        payload.stock,
        payload.status.is_some(),
    );
    let now = Utc::now();
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller_id),
        category_id: Set(payload.category_id),
        material_id: Set(payload.material_id),
        name: Set(name),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(payload.stock),
        status: Set(status),
        featured: Set(payload.featured),
        images: Set(payload.images),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        seller_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &Principal,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let seller_id = state.auth.require_seller(user)?;
    let existing = Products::find_by_id(id)
        .filter(Column::SellerId.eq(seller_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    check_references(state, seller_id, payload.category_id, payload.material_id).await?;

    let stock = payload.stock.unwrap_or(existing.stock);
    let status = reconcile_status(
        payload.status.unwrap_or(existing.status),
        stock,
        payload.status.is_some(),
    );

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::bad_request("Name is required"));
        }
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        validate_stock(stock)?;
        active.stock = Set(stock);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(Some(category_id));
    }
    if let Some(material_id) = payload.material_id {
        active.material_id = Set(Some(material_id));
    }
    if let Some(featured) = payload.featured {
        active.featured = Set(featured);
    }
    if let Some(images) = payload.images {
        active.images = Set(images);
    }
    active.status = Set(status);
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        seller_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &Principal,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let seller_id = state.auth.require_seller(user)?;
    let ordered = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if ordered > 0 {
        return Err(AppError::bad_request(
            "Product has existing orders; mark it DISCONTINUED instead",
        ));
    }

    let result = Products::delete_many()
        .filter(Column::Id.eq(id))
        .filter(Column::SellerId.eq(seller_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        seller_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price < Decimal::ZERO {
        return Err(AppError::bad_request("Price must not be negative"));
    }
    if !pricing::is_storable_money(price) {
        return Err(AppError::bad_request(
            "Price must be at most 9999999999.99 with no more than 2 decimal places",
        ));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> AppResult<()> {
    if stock < 0 {
        return Err(AppError::bad_request("Stock must not be negative"));
    }
    Ok(())
}

/// Category and material must belong to the same seller as the product.
async fn check_references(
    state: &AppState,
    seller_id: Uuid,
    category_id: Option<Uuid>,
    material_id: Option<Uuid>,
) -> AppResult<()> {
    if let Some(id) = category_id {
        category_service::find_owned(&state.orm, seller_id, id)
            .await
            .map_err(|err| match err {
                AppError::NotFound => AppError::bad_request("Category not found"),
                other => other,
            })?;
    }
    if let Some(id) = material_id {
        material_service::find_owned(&state.orm, seller_id, id)
            .await
            .map_err(|err| match err {
                AppError::NotFound => AppError::bad_request("Material not found"),
                other => other,
            })?;
    }
    Ok(())
}

/// Keeps ACTIVE/OUT_OF_STOCK in line with the stock level unless the seller
/// set a status explicitly.
fn reconcile_status(status: ProductStatus, stock: i32, explicit: bool) -> ProductStatus {
    if explicit {
        return status;
    }
    match status {
        ProductStatus::Active if stock == 0 => ProductStatus::OutOfStock,
        ProductStatus::OutOfStock if stock > 0 => ProductStatus::Active,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_drives_implicit_status() {
        assert_eq!(
            reconcile_status(ProductStatus::Active, 0, false),
            ProductStatus::OutOfStock
        );
        assert_eq!(
            reconcile_status(ProductStatus::OutOfStock, 4, false),
            ProductStatus::Active
        );
        assert_eq!(
            reconcile_status(ProductStatus::Discontinued, 0, false),
            ProductStatus::Discontinued
        );
    }

    #[test]
    fn explicit_status_wins() {
        assert_eq!(
            reconcile_status(ProductStatus::Active, 0, true),
            ProductStatus::Active
        );
    }

    #[test]
    fn negative_values_are_rejected() {
        assert!(validate_price(Decimal::new(-1, 2)).is_err());
        assert!(validate_stock(-1).is_err());
        assert!(validate_price(Decimal::ZERO).is_ok());
    }

    #[test]
    fn prices_must_fit_the_money_column() {
        assert!(validate_price(Decimal::new(249_999, 2)).is_ok());
        assert!(validate_price(Decimal::new(999_999_999_999, 2)).is_ok());
        assert!(validate_price(Decimal::new(1_000_000_000_000, 2)).is_err());
        assert!(validate_price(Decimal::new(10_005, 3)).is_err());
        assert!(validate_price(Decimal::MAX).is_err());
    }
}
