use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
    sea_query::{Expr, Func},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::catalog::{MaterialList, CreateCatalogEntryRequest, UpdateCatalogEntryRequest},
    entity::{
        materials::{ActiveModel, Column, Entity as Materials, Model as MaterialModel},
        products::Column as ProdCol,
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::Material,
    response::{ApiResponse, Meta},
    routes::params::CatalogQuery,
    services::catalog::{count_products, ensure_no_products, product_counts, required_name},
    state::AppState,
};

pub async fn list_materials(
    state: &AppState,
    query: CatalogQuery,
) -> AppResult<ApiResponse<MaterialList>> {
    let mut condition = Condition::all();
    if let Some(seller_id) = query.seller_id {
        condition = condition.add(Column::SellerId.eq(seller_id));
    }
    if let Some(active) = query.active {
        condition = condition.add(Column::IsActive.eq(active));
    }

    let rows = Materials::find()
        .filter(condition)
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?;

    let ids = rows.iter().map(|c| c.id).collect();
    let counts = product_counts(&state.orm, ProdCol::MaterialId, ids).await?;
    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .map(|c| {
            let count = counts.get(&c.id).copied().unwrap_or(0);
            Material::from_entity(c, count)
        })
        .collect();

    Ok(ApiResponse::success(
        "Materials",
        MaterialList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_material(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Material>> {
    let material = Materials::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let count = count_products(&state.orm, ProdCol::MaterialId, id).await?;
    Ok(ApiResponse::success(
        "Material",
        Material::from_entity(material, count),
        None,
    ))
}

pub async fn create_material(
    state: &AppState,
    user: &Principal,
    payload: CreateCatalogEntryRequest,
) -> AppResult<ApiResponse<Material>> {
    let seller_id = state.auth.require_seller(user)?;
    let name = required_name(&payload.name)?;
    ensure_unique_name(&state.orm, seller_id, &name, None).await?;

    let now = Utc::now();
    let material = ActiveModel {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller_id),
        name: Set(name),
        description: Set(payload.description),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        seller_id,
        "material_create",
        "materials",
        serde_json::json!({ "material_id": material.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Material created",
        Material::from_entity(material, 0),
        Some(Meta::empty()),
    ))
}

pub async fn update_material(
    state: &AppState,
    user: &Principal,
    id: Uuid,
    payload: UpdateCatalogEntryRequest,
) -> AppResult<ApiResponse<Material>> {
    let seller_id = state.auth.require_seller(user)?;
    let existing = find_owned(&state.orm, seller_id, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = required_name(&name)?;
        ensure_unique_name(&state.orm, seller_id, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().into());
    let material = active.update(&state.orm).await?;
    let count = count_products(&state.orm, ProdCol::MaterialId, id).await?;

    audit::record(
        &state.orm,
        seller_id,
        "material_update",
        "materials",
        serde_json::json!({ "material_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Material updated",
        Material::from_entity(material, count),
        Some(Meta::empty()),
    ))
}

pub async fn delete_material(
    state: &AppState,
    user: &Principal,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let seller_id = state.auth.require_seller(user)?;
    find_owned(&state.orm, seller_id, id).await?;

    ensure_no_products(&state.orm, ProdCol::MaterialId, id, "material").await?;

    Materials::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.orm,
        seller_id,
        "material_delete",
        "materials",
        serde_json::json!({ "material_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// A material owned by `seller_id`; anything else is reported as not found.
pub async fn find_owned<C: ConnectionTrait>(
    db: &C,
    seller_id: Uuid,
    id: Uuid,
) -> AppResult<MaterialModel> {
    Materials::find_by_id(id)
        .filter(Column::SellerId.eq(seller_id))
        .one(db)
        .await?
        .ok_or(AppError::NotFound)
}

async fn ensure_unique_name<C: ConnectionTrait>(
    db: &C,
    seller_id: Uuid,
    name: &str,
    except: Option<Uuid>,
) -> AppResult<()> {
    let mut finder = Materials::find()
        .filter(Column::SellerId.eq(seller_id))
        .filter(Expr::expr(Func::lower(Expr::col(Column::Name))).eq(name.to_lowercase()));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    if finder.count(db).await? > 0 {
        return Err(AppError::bad_request("Material with this name already exists"));
    }
    Ok(())
}
