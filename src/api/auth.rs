//! Authentication API endpoints
//!
//! Login is public and rate limited; the rest needs a valid token.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    middleware::{create_access_token, AuthUser},
    models::{AuthResponse, ChangePasswordRequest, LoginRequest, UserPublic},
    services::AuthService,
    utils::{validation::check_password, AppError},
    AppState,
};

/// Routes reachable without a token
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Routes for the authenticated caller
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/change-password", post(change_password))
}

/// The caller with their effective permissions
#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub user: UserPublic,
    pub permissions: Vec<String>,
}

/// Login handler
///
/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let principal = AuthService::new(state.db.clone())
        .authenticate(&payload.username, &payload.password)
        .await?
        .ok_or_else(|| {
            warn!(username = %payload.username, "Failed login attempt");
            AppError::unauthorized("Invalid username or password")
        })?;

    let access_token = create_access_token(
        &principal.user,
        &principal.role,
        &state.config.auth.jwt_secret,
        state.config.auth.token_expiry_hours,
    )
    .map_err(|e| AppError::internal(format!("Failed to create token: {}", e)))?;

    info!(username = %principal.user.username, role = %principal.role.name, "User logged in");

    let role_name = principal.role.name.clone();
    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.auth.token_expiry_hours * 3600,
        user: UserPublic::from(principal.user).with_role_name(role_name),
    }))
}

/// GET /api/v1/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<CurrentUserResponse>, AppError> {
    let user = state.users().get_user(auth.id).await?;

    Ok(Json(CurrentUserResponse {
        user,
        permissions: auth.permissions.iter().map(ToString::to_string).collect(),
    }))
}

/// POST /api/v1/auth/change-password
async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let min_length = state.config.auth.password_min_length;
    check_password(&payload.new_password, min_length).map_err(AppError::ValidationError)?;

    let changed = AuthService::new(state.db.clone())
        .change_password(
            auth.id,
            &payload.current_password,
            &payload.new_password,
            min_length,
        )
        .await?;

    if !changed {
        return Err(AppError::bad_request("Current password is incorrect"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Password changed"
    })))
}
