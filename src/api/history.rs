//! Change history API endpoints
//!
//! Read only: history entries are written by the services alongside the
//! changes they describe.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::{
    db::HistoryRepository,
    middleware::AuthUser,
    models::{Action, HistoryEntry, HistoryQuery, Resource},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_history))
}

/// GET /api/v1/history?entity_type=report&entity_id=..&limit=..
async fn list_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    auth.require(Resource::History, Action::Read)?;
    let entries = HistoryRepository::new(&state.db).list(&query).await?;
    Ok(Json(entries))
}
