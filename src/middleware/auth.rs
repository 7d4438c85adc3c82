//! JWT Authentication Middleware
//!
//! Validates access tokens and attaches the caller to the request. The user
//! and role are reloaded on every request, so deactivations and role changes
//! apply to tokens already issued.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    models::{Action, Permission, Resource, Role, User},
    services::{AuthService, Principal},
    utils::{error::ErrorResponse, AppError},
    AppState,
};

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    /// Role name at issue time
    pub role: String,
    /// Permissions at issue time, as `resource:action`
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub is_admin: bool,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Not before timestamp
    pub nbf: i64,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// The caller of an authenticated request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role_id: Uuid,
    pub role_name: String,
    pub permissions: Vec<Permission>,
    pub is_admin: bool,
}

impl From<Principal> for AuthUser {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.user.id,
            username: principal.user.username,
            role_id: principal.role.id,
            role_name: principal.role.name,
            // An inactive role grants nothing
            permissions: if principal.role.active {
                principal.role.permissions
            } else {
                Vec::new()
            },
            is_admin: principal.user.is_admin,
        }
    }
}

impl AuthUser {
    pub fn can(&self, resource: Resource, action: Action) -> bool {
        self.is_admin || self.permissions.iter().any(|p| p.grants(resource, action))
    }

    /// Fail with 403 unless the caller may perform `action` on `resource`
    pub fn require(&self, resource: Resource, action: Action) -> Result<(), AppError> {
        if self.can(resource, action) {
            Ok(())
        } else {
            warn!(
                user = %self.username,
                resource = resource.as_str(),
                action = action.as_str(),
                "Permission denied"
            );
            Err(AppError::forbidden(format!(
                "Missing permission {}:{}",
                resource.as_str(),
                action.as_str()
            )))
        }
    }
}

/// Extractor for AuthUser from request extensions
///
/// This allows using AuthUser as a handler parameter after auth middleware has run.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("unauthorized", "Authentication required")),
            )
        })
    }
}

/// Create a new JWT access token
pub fn create_access_token(
    user: &User,
    role: &Role,
    secret: &str,
    expiry_hours: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: role.name.clone(),
        permissions: role.permissions.iter().map(ToString::to_string).collect(),
        is_admin: user.is_admin,
        iat: now.timestamp(),
        exp: exp.timestamp(),
        nbf: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate and decode a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<TokenData<Claims>, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

/// Authentication error types
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    TokenExpired,
    /// Token is valid but the account no longer is
    InactiveUser,
    Unavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authentication token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid authentication token"),
            AuthError::TokenExpired => {
                (StatusCode::UNAUTHORIZED, "Authentication token has expired")
            }
            AuthError::InactiveUser => {
                (StatusCode::UNAUTHORIZED, "User account is inactive or no longer exists")
            }
            AuthError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication is temporarily unavailable",
            ),
        };

        let error = if status == StatusCode::UNAUTHORIZED {
            "unauthorized"
        } else {
            "service_unavailable"
        };

        (status, Json(ErrorResponse::new(error, message))).into_response()
    }
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
}

/// Extract token from query string (for SSE/EventSource which can't send headers)
fn extract_query_token(uri: &axum::http::Uri) -> Option<String> {
    uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == "token" && !value.is_empty()).then(|| value.to_string())
        })
    })
}

/// Authentication middleware
///
/// Reads the token from the Authorization header, or from the `token` query
/// parameter for EventSource clients, and injects the [`AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header_token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| extract_bearer_token(h).map(str::to_string).ok_or(AuthError::InvalidToken))
        .transpose()?;

    let token = header_token
        .or_else(|| extract_query_token(request.uri()))
        .ok_or(AuthError::MissingToken)?;

    let claims = validate_token(&token, &state.config.auth.jwt_secret)?.claims;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

    let principal = AuthService::new(state.db.clone())
        .load_principal(user_id)
        .await
        .map_err(|e| {
            error!(user_id = %user_id, "Failed to load authenticated user: {:#}", e);
            AuthError::Unavailable
        })?
        .ok_or(AuthError::InactiveUser)?;

    request.extensions_mut().insert(AuthUser::from(principal));

    Ok(next.run(request).await)
}
