use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::wishlist::{AddWishlistRequest, WishlistProductList},
    entity::{
        products::Entity as Products,
        wishlist_items::{ActiveModel, Column, Entity as WishlistItems},
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_wishlist(
    state: &AppState,
    user: &Principal,
    pagination: Pagination,
) -> AppResult<ApiResponse<WishlistProductList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = WishlistItems::find().filter(Column::UserId.eq(user.user_id));

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .order_by_desc(Column::CreatedAt)
        .limit(limit as u64)
        .offset(offset as u64)
        .find_also_related(Products)
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|(_, product)| product.map(Product::from))
        .collect();

    Ok(ApiResponse::success(
        "Wishlist",
        WishlistProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Adding a product that is already on the list is a no-op.
pub async fn add_to_wishlist(
    state: &AppState,
    user: &Principal,
    payload: AddWishlistRequest,
) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::bad_request("Product not found"))?;

    let existing = WishlistItems::find()
        .filter(Column::UserId.eq(user.user_id))
        .filter(Column::ProductId.eq(product.id))
        .one(&state.orm)
        .await?;

    if existing.is_none() {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.user_id),
            product_id: Set(product.id),
            created_at: Set(Utc::now().into()),
        }
        .insert(&state.orm)
        .await?;

        audit::record(
            &state.orm,
            user.user_id,
            "wishlist_add",
            "wishlist_items",
            serde_json::json!({ "product_id": product.id }),
        )
        .await;
    }

    Ok(ApiResponse::success(
        "Added to wishlist",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_wishlist(
    state: &AppState,
    user: &Principal,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = WishlistItems::delete_many()
        .filter(Column::UserId.eq(user.user_id))
        .filter(Column::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        user.user_id,
        "wishlist_remove",
        "wishlist_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from wishlist",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
