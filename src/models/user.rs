//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::validate_username;

/// User (Usuario) entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_id: Uuid,
    /// Administrators bypass permission checks
    #[serde(default)]
    pub is_admin: bool,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user
    pub fn new(
        username: String,
        email: String,
        full_name: String,
        password_hash: String,
        role_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            full_name,
            password_hash,
            role_id,
            is_admin: false,
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// User without password hash for safe serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role_id: Uuid,
    /// Role name, filled in when the role is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    pub is_admin: bool,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            role_id: user.role_id,
            role_name: None,
            is_admin: user.is_admin,
            active: user.active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl UserPublic {
    pub fn with_role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }
}

/// Request to create a new user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    pub password: String,
    /// Defaults to the configured default role
    pub role_id: Option<Uuid>,
    #[serde(default)]
    pub is_admin: bool,
}

/// Request to update a user's profile
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub is_admin: Option<bool>,
}

/// Request to move a user to another role
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangeRoleRequest {
    pub role_id: Uuid,
    #[validate(length(max = 500))]
    pub comment: Option<String>,
}

/// Filters for listing users
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub role_id: Option<Uuid>,
    pub active: Option<bool>,
    /// Matches username, email or full name
    pub q: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Password change for the authenticated user
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Authentication response with access token
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserPublic,
}
