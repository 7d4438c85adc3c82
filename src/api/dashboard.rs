//! Dashboard and report map endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{Action, DashboardQuery, DashboardSummary, FeatureCollection, MapQuery, Resource},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/summary", get(summary))
}

pub fn map_routes() -> Router<AppState> {
    Router::new().route("/reports", get(report_map))
}

/// GET /api/v1/dashboard/summary?days=30
async fn summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSummary>, AppError> {
    auth.require(Resource::Dashboard, Action::Read)?;
    Ok(Json(state.dashboard().summary(&query).await?))
}

/// GET /api/v1/map/reports?bbox=min_lon,min_lat,max_lon,max_lat
///
/// GeoJSON for the admin map.
async fn report_map(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<MapQuery>,
) -> Result<Json<FeatureCollection>, AppError> {
    auth.require(Resource::Reports, Action::Read)?;
    Ok(Json(state.dashboard().map(&query).await?))
}
