//! Authentication service
//!
//! Password hashing with Argon2id, credential checks and the first-start
//! bootstrap of an administrator account.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::{HistoryRepository, RoleRepository, UserRepository};
use crate::models::{HistoryAction, NewHistoryEntry, Role, SystemRole, User};
use crate::utils::validation::check_password;

/// Authentication service
pub struct AuthService {
    pool: SqlitePool,
}

/// An authenticated account together with its role
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub role: Role,
}

impl AuthService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Check credentials. Inactive accounts never authenticate.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<Principal>> {
        let Some(user) = UserRepository::new(&self.pool)
            .get_by_username(username)
            .await?
        else {
            return Ok(None);
        };

        if !Self::verify_password(password, &user.password_hash)? {
            return Ok(None);
        }
        if !user.active {
            warn!(username = %username, "Login attempt for inactive user");
            return Ok(None);
        }

        UserRepository::new(&self.pool)
            .update_last_login(user.id)
            .await?;

        self.principal_for(user).await.map(Some)
    }

    /// Load an active user and their role, as done for every authenticated request
    pub async fn load_principal(&self, user_id: Uuid) -> Result<Option<Principal>> {
        match UserRepository::new(&self.pool).get_by_id(user_id).await? {
            Some(user) if user.active => self.principal_for(user).await.map(Some),
            _ => Ok(None),
        }
    }

    async fn principal_for(&self, user: User) -> Result<Principal> {
        let role = RoleRepository::new(&self.pool)
            .get_by_id(user.role_id)
            .await?
            .with_context(|| format!("Role {} of user {} not found", user.role_id, user.username))?;

        Ok(Principal { user, role })
    }

    /// Change the password of `user_id` after checking the current one
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        min_length: usize,
    ) -> Result<bool> {
        let repo = UserRepository::new(&self.pool);
        let user = repo.get_by_id(user_id).await?.context("User not found")?;

        if !Self::verify_password(current_password, &user.password_hash)? {
            return Ok(false);
        }
        check_password(new_password, min_length).map_err(|e| anyhow::anyhow!(e))?;

        repo.update_password(user_id, &Self::hash_password(new_password)?)
            .await?;
        info!(user_id = %user_id, "Password changed");

        Ok(true)
    }

    /// Create the configured administrator when no user exists yet.
    ///
    /// Returns the created user, or `None` when users already exist or no
    /// password was provided.
    pub async fn bootstrap_admin(&self, config: &AuthConfig) -> Result<Option<User>> {
        let users = UserRepository::new(&self.pool);
        if users.count().await? > 0 {
            return Ok(None);
        }

        let Some(admin) = config.bootstrap_admin.as_ref() else {
            warn!("No users exist and auth.bootstrap_admin is not configured");
            return Ok(None);
        };
        let Some(password) = admin.password.as_deref().filter(|p| !p.is_empty()) else {
            warn!(
                username = %admin.username,
                "No users exist; set CIVIC_ADMIN_PASSWORD or auth.bootstrap_admin.password to create the administrator"
            );
            return Ok(None);
        };
        check_password(password, config.password_min_length).map_err(|e| anyhow::anyhow!(e))?;

        let mut user = User::new(
            admin.username.clone(),
            admin.email.clone(),
            admin.full_name.clone(),
            Self::hash_password(password)?,
            SystemRole::Admin.uuid(),
        );
        user.is_admin = true;

        let mut tx = self.pool.begin().await?;
        UserRepository::insert(&mut tx, &user).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::user(user.id, HistoryAction::Created)
                .comment(Some("bootstrap administrator")),
        )
        .await?;
        tx.commit().await?;

        info!(username = %user.username, "Bootstrap administrator created");
        Ok(Some(user))
    }
}
