//! Report status API endpoints

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
        Action, CascadeSummary, CatalogQuery, CreateStatusRequest, DeactivateRequest,
        ReportStatus, Resource, UpdateStatusRequest,
    },
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_statuses).post(create_status))
        .route("/{id}", get(get_status).put(update_status))
        .route("/{id}/deactivate", post(deactivate_status))
        .route("/{id}/activate", post(activate_status))
}

/// Ordered by `sort_order`
async fn list_statuses(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<ReportStatus>>, AppError> {
    auth.require(Resource::Statuses, Action::Read)?;
    Ok(Json(
        state.catalog().list_statuses(query.include_inactive).await?,
    ))
}

async fn create_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateStatusRequest>,
) -> Result<(StatusCode, Json<ReportStatus>), AppError> {
    auth.require(Resource::Statuses, Action::Create)?;
    let status = state.catalog().create_status(payload, auth.id).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

async fn get_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportStatus>, AppError> {
    auth.require(Resource::Statuses, Action::Read)?;
    Ok(Json(state.catalog().get_status(id).await?))
}

async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ReportStatus>, AppError> {
    auth.require(Resource::Statuses, Action::Update)?;
    Ok(Json(state.catalog().update_status(id, payload, auth.id).await?))
}

/// Reports in the status move to `replacement_id`, or to the initial status
async fn deactivate_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DeactivateRequest>>,
) -> Result<Json<CascadeSummary>, AppError> {
    auth.require(Resource::Statuses, Action::Delete)?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    Ok(Json(
        state.catalog().deactivate_status(id, payload, auth.id).await?,
    ))
}

async fn activate_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportStatus>, AppError> {
    auth.require(Resource::Statuses, Action::Update)?;
    Ok(Json(state.catalog().activate_status(id, auth.id).await?))
}
