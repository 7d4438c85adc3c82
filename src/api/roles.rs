//! Role management API endpoints

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
        Action, CascadeSummary, CatalogQuery, CreateRoleRequest, DeactivateRequest, Resource,
        Role, UpdateRoleRequest,
    },
    utils::AppError,
    AppState,
};

/// Create routes for role management
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/{id}", get(get_role).put(update_role).delete(delete_role))
        .route("/{id}/deactivate", post(deactivate_role))
        .route("/{id}/activate", post(activate_role))
        .route("/permissions", get(list_permissions))
}

async fn list_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<Role>>, AppError> {
    auth.require(Resource::Roles, Action::Read)?;
    Ok(Json(state.users().list_roles(query.include_inactive).await?))
}

async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), AppError> {
    auth.require(Resource::Roles, Action::Create)?;
    let role = state.users().create_role(payload, auth.id).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn get_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Role>, AppError> {
    auth.require(Resource::Roles, Action::Read)?;
    Ok(Json(state.users().get_role(id).await?))
}

async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<Role>, AppError> {
    auth.require(Resource::Roles, Action::Update)?;
    Ok(Json(state.users().update_role(id, payload, auth.id).await?))
}

/// Only custom roles nobody holds can be deleted
async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(Resource::Roles, Action::Delete)?;
    state.users().delete_role(id, auth.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Members move to `replacement_id`, or to the configured default role
async fn deactivate_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DeactivateRequest>>,
) -> Result<Json<CascadeSummary>, AppError> {
    auth.require(Resource::Roles, Action::Delete)?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    Ok(Json(state.users().deactivate_role(id, payload, auth.id).await?))
}

async fn activate_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Role>, AppError> {
    auth.require(Resource::Roles, Action::Update)?;
    Ok(Json(state.users().activate_role(id, auth.id).await?))
}

/// Every `resource:action` pair a role may grant
async fn list_permissions(auth: AuthUser) -> Result<Json<Vec<String>>, AppError> {
    auth.require(Resource::Roles, Action::Read)?;
    let permissions = Resource::all()
        .into_iter()
        .flat_map(|resource| {
            Action::all()
                .into_iter()
                .map(move |action| format!("{}:{}", resource.as_str(), action.as_str()))
        })
        .collect();
    Ok(Json(permissions))
}
