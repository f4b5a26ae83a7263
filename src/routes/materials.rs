use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::catalog::{CreateCatalogEntryRequest, MaterialList, UpdateCatalogEntryRequest},
    error::AppResult,
    middleware::auth::Principal,
    models::Material,
    response::ApiResponse,
    routes::params::CatalogQuery,
    services::material_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_materials).post(create_material))
        .route(
            "/{id}",
            get(get_material).put(update_material).delete(delete_material),
        )
}

#[utoipa::path(
    get,
    path = "/api/materials",
    params(CatalogQuery),
    responses(
        (status = 200, description = "List materials", body = ApiResponse<MaterialList>)
    ),
    tag = "Materials"
)]
pub async fn list_materials(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> AppResult<Json<ApiResponse<MaterialList>>> {
    let resp = material_service::list_materials(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/materials/{id}",
    params(
        ("id" = Uuid, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Get material", body = ApiResponse<Material>),
        (status = 404, description = "Material not found")
    ),
    tag = "Materials"
)]
pub async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Material>>> {
    let resp = material_service::get_material(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/materials",
    request_body = CreateCatalogEntryRequest,
    responses(
        (status = 201, description = "Create material", body = ApiResponse<Material>),
        (status = 400, description = "Duplicate name")
    ),
    security(("bearer_auth" = [])),
    tag = "Materials"
)]
pub async fn create_material(
    State(state): State<AppState>,
    user: Principal,
    Json(payload): Json<CreateCatalogEntryRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Material>>)> {
    let resp = material_service::create_material(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/materials/{id}",
    params(
        ("id" = Uuid, Path, description = "Material ID")
    ),
    request_body = UpdateCatalogEntryRequest,
    responses(
        (status = 200, description = "Updated material", body = ApiResponse<Material>),
        (status = 404, description = "Material not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Materials"
)]
pub async fn update_material(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCatalogEntryRequest>,
) -> AppResult<Json<ApiResponse<Material>>> {
    let resp = material_service::update_material(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/materials/{id}",
    params(
        ("id" = Uuid, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Deleted material"),
        (status = 400, description = "Material still has products"),
        (status = 404, description = "Material not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Materials"
)]
pub async fn delete_material(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = material_service::delete_material(&state, &user, id).await?;
    Ok(Json(resp))
}
