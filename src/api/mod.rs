//! API routes and handlers
//!
//! Every route is mounted under `/api/v1`. Handlers check permissions
//! themselves through [`crate::middleware::AuthUser::require`].

use axum::{routing::get, Router};

use crate::{
    middleware::{self, RateLimitState},
    AppState,
};

mod auth;
mod categories;
mod dashboard;
mod geocoding;
mod health;
mod history;
mod notifications;
mod reports;
mod roles;
mod statuses;
mod users;

pub use health::*;

/// Health probes, no authentication or rate limit
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
}

/// Credential endpoints, mounted behind the login rate limit
pub fn public_routes() -> Router<AppState> {
    Router::new().nest("/auth", auth::public_routes())
}

/// Protected API routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::protected_routes())
        .nest("/reports", reports::routes())
        .nest("/categories", categories::routes())
        .nest("/statuses", statuses::routes())
        .nest("/users", users::routes())
        .nest("/roles", roles::routes())
        .nest("/history", history::routes())
        .nest("/dashboard", dashboard::routes())
        .nest("/map", dashboard::map_routes())
        .nest("/geocoding", geocoding::routes())
        .nest("/notifications", notifications::routes())
}

/// Every API route, with the login rate limit on credential checks and
/// authentication on the protected ones
pub fn routes(state: AppState, login_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(public_routes().layer(axum::middleware::from_fn_with_state(
            login_limit,
            middleware::rate_limit_middleware,
        )))
        .merge(protected_routes().layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        )))
}
