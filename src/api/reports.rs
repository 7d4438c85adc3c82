//! Citizen report API endpoints
//!
//! Each workflow step has its own route so every change is permission
//! checked and logged on its own.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    middleware::AuthUser,
    models::{
        Action, AssignReportRequest, ChangeCategoryRequest, ChangePriorityRequest,
        ChangeStatusRequest, CreateReportRequest, HistoryEntry, Report, ReportPage, ReportQuery,
        Resource, UpdateReportRequest,
    },
    utils::AppError,
    AppState,
};

/// Create routes for reports
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reports).post(create_report))
        .route(
            "/{id}",
            get(get_report).put(update_report).delete(delete_report),
        )
        .route("/{id}/status", put(update_status))
        .route("/{id}/assign", put(assign_report))
        .route("/{id}/priority", put(update_priority))
        .route("/{id}/category", put(change_category))
        .route("/{id}/history", get(report_history))
}

/// GET /api/v1/reports
async fn list_reports(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportPage>, AppError> {
    auth.require(Resource::Reports, Action::Read)?;
    Ok(Json(state.reports().list_reports(&query).await?))
}

/// POST /api/v1/reports
async fn create_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<Report>), AppError> {
    auth.require(Resource::Reports, Action::Create)?;
    let report = state.reports().create_report(payload, Some(auth.id)).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn get_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Report>, AppError> {
    auth.require(Resource::Reports, Action::Read)?;
    Ok(Json(state.reports().get_report(id).await?))
}

async fn update_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReportRequest>,
) -> Result<Json<Report>, AppError> {
    auth.require(Resource::Reports, Action::Update)?;
    Ok(Json(state.reports().update_report(id, payload, auth.id).await?))
}

async fn delete_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(Resource::Reports, Action::Delete)?;
    state.reports().delete_report(id, auth.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/reports/{id}/status
async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeStatusRequest>,
) -> Result<Json<Report>, AppError> {
    auth.require(Resource::Reports, Action::Update)?;
    Ok(Json(state.reports().update_status(id, payload, auth.id).await?))
}

/// PUT /api/v1/reports/{id}/assign
///
/// `{"user_id": null}` unassigns.
async fn assign_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignReportRequest>,
) -> Result<Json<Report>, AppError> {
    auth.require(Resource::Reports, Action::Assign)?;
    Ok(Json(state.reports().assign_report(id, payload, auth.id).await?))
}

async fn update_priority(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangePriorityRequest>,
) -> Result<Json<Report>, AppError> {
    auth.require(Resource::Reports, Action::Update)?;
    Ok(Json(
        state.reports().update_priority(id, payload, auth.id).await?,
    ))
}

async fn change_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeCategoryRequest>,
) -> Result<Json<Report>, AppError> {
    auth.require(Resource::Reports, Action::Update)?;
    Ok(Json(
        state.reports().change_category(id, payload, auth.id).await?,
    ))
}

async fn report_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    auth.require(Resource::Reports, Action::Read)?;
    Ok(Json(state.reports().report_history(id).await?))
}
