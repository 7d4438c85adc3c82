//! User management API endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    middleware::AuthUser,
    models::{
        Action, CascadeSummary, ChangeRoleRequest, CreateUserRequest, DeactivateRequest,
        HistoryEntry, Resource, UpdateUserRequest, UserPublic, UserQuery,
    },
    utils::AppError,
    AppState,
};

/// Create routes for user management
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user))
        .route("/{id}/role", put(change_role))
        .route("/{id}/deactivate", post(deactivate_user))
        .route("/{id}/activate", post(activate_user))
        .route("/{id}/history", get(user_history))
}

async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<UserPublic>>, AppError> {
    auth.require(Resource::Users, Action::Read)?;
    Ok(Json(state.users().list_users(&query).await?))
}

async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<UserPublic>, AppError> {
    auth.require(Resource::Users, Action::Create)?;
    if payload.is_admin && !auth.is_admin {
        return Err(AppError::forbidden("Only administrators can create administrators"));
    }
    Ok(Json(state.users().create_user(payload, Some(auth.id)).await?))
}

async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserPublic>, AppError> {
    if auth.id != id {
        auth.require(Resource::Users, Action::Read)?;
    }
    Ok(Json(state.users().get_user(id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserPublic>, AppError> {
    auth.require(Resource::Users, Action::Update)?;
    if payload.is_admin.is_some() && !auth.is_admin {
        return Err(AppError::forbidden("Only administrators can change the admin flag"));
    }
    Ok(Json(state.users().update_user(id, payload, auth.id).await?))
}

/// PUT /api/v1/users/{id}/role
async fn change_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeRoleRequest>,
) -> Result<Json<UserPublic>, AppError> {
    auth.require(Resource::Users, Action::Update)?;
    auth.require(Resource::Roles, Action::Assign)?;
    Ok(Json(state.users().change_role(id, payload, auth.id).await?))
}

/// Deactivating a user releases their open reports
async fn deactivate_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DeactivateRequest>>,
) -> Result<Json<CascadeSummary>, AppError> {
    auth.require(Resource::Users, Action::Delete)?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    Ok(Json(state.users().deactivate_user(id, payload, auth.id).await?))
}

async fn activate_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserPublic>, AppError> {
    auth.require(Resource::Users, Action::Update)?;
    Ok(Json(state.users().activate_user(id, auth.id).await?))
}

async fn user_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    auth.require(Resource::History, Action::Read)?;
    Ok(Json(state.users().user_history(id).await?))
}
