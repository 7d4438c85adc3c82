//! Report category API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    middleware::AuthUser,
    models::{
        Action, CascadeSummary, CatalogQuery, Category, CreateCategoryRequest,
        DeactivateRequest, Resource, UpdateCategoryRequest,
    },
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/{id}", get(get_category).put(update_category))
        .route("/{id}/deactivate", post(deactivate_category))
        .route("/{id}/activate", post(activate_category))
}

async fn list_categories(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<Category>>, AppError> {
    auth.require(Resource::Categories, Action::Read)?;
    Ok(Json(
        state.catalog().list_categories(query.include_inactive).await?,
    ))
}

async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    auth.require(Resource::Categories, Action::Create)?;
    let category = state.catalog().create_category(payload, auth.id).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn get_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, AppError> {
    auth.require(Resource::Categories, Action::Read)?;
    Ok(Json(state.catalog().get_category(id).await?))
}

async fn update_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    auth.require(Resource::Categories, Action::Update)?;
    Ok(Json(
        state.catalog().update_category(id, payload, auth.id).await?,
    ))
}

/// Categories are never deleted; reports move to `replacement_id` when given
async fn deactivate_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DeactivateRequest>>,
) -> Result<Json<CascadeSummary>, AppError> {
    auth.require(Resource::Categories, Action::Delete)?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    Ok(Json(
        state
            .catalog()
            .deactivate_category(id, payload, auth.id)
            .await?,
    ))
}

async fn activate_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, AppError> {
    auth.require(Resource::Categories, Action::Update)?;
    Ok(Json(state.catalog().activate_category(id, auth.id).await?))
}
