//! Address lookup endpoints backed by Nominatim

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{Action, GeocodeResult, GeocodeSearchQuery, Resource, ReverseGeocodeQuery},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(search))
        .route("/reverse", get(reverse))
}

/// GET /api/v1/geocoding/search?q=..&limit=..
async fn search(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<GeocodeSearchQuery>,
) -> Result<Json<Vec<GeocodeResult>>, AppError> {
    auth.require(Resource::Reports, Action::Read)?;
    Ok(Json(state.geocoder.search(&query.q, query.limit).await?))
}

/// GET /api/v1/geocoding/reverse?lat=..&lon=..
///
/// Responds with `null` when Nominatim has no address for the point.
async fn reverse(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ReverseGeocodeQuery>,
) -> Result<Json<Option<GeocodeResult>>, AppError> {
    auth.require(Resource::Reports, Action::Read)?;
    Ok(Json(state.geocoder.reverse(query.lat, query.lon).await?))
}
