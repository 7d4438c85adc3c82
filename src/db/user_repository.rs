//! User repository

use anyhow::{Context, Result};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::{like_pattern, now_timestamp, parse_db_timestamp, parse_uuid};
use crate::models::{User, UserQuery};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    full_name: String,
    password_hash: String,
    role_id: String,
    is_admin: bool,
    active: bool,
    last_login_at: Option<String>,
    created_at: String,
    updated_at: String,
}

const SELECT_USER: &str = r#"
    SELECT id, username, email, full_name, password_hash, role_id, is_admin, active,
           last_login_at, created_at, updated_at
    FROM users
"#;

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &UserQuery) -> Result<Vec<User>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_USER);
        builder.push(" WHERE 1 = 1");

        if let Some(role_id) = query.role_id {
            builder.push(" AND role_id = ").push_bind(role_id.to_string());
        }
        if let Some(active) = query.active {
            builder.push(" AND active = ").push_bind(active);
        }
        if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = like_pattern(&q.to_lowercase());
            builder
                .push(" AND (LOWER(username) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'")
                .push(" OR LOWER(email) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'")
                .push(" OR LOWER(full_name) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\'")
                .push(")");
        }
        builder.push(" ORDER BY username");

        let rows = builder
            .build_query_as::<UserRow>()
            .fetch_all(self.pool)
            .await
            .context("Failed to list users")?;

        Ok(rows.into_iter().map(row_to_user).collect())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        find_by_id(self.pool, id).await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE username = ?"))
            .bind(username)
            .fetch_optional(self.pool)
            .await
            .context("Failed to get user by username")?;

        Ok(row.map(row_to_user))
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await
            .context("Failed to count users")?;

        Ok(count)
    }

    pub async fn update_last_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to update last login")?;

        Ok(())
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to update password")?;

        Ok(())
    }

    pub async fn insert(conn: &mut SqliteConnection, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, full_name, password_hash, role_id,
                               is_admin, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.role_id.to_string())
        .bind(user.is_admin)
        .bind(user.active)
        .bind(super::format_timestamp(user.created_at))
        .bind(super::format_timestamp(user.updated_at))
        .execute(conn)
        .await
        .context("Failed to create user")?;

        Ok(())
    }

    /// Persist profile fields (email, full name, password hash, admin flag)
    pub async fn update_profile(conn: &mut SqliteConnection, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET email = ?, full_name = ?, password_hash = ?, is_admin = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(now_timestamp())
        .bind(user.id.to_string())
        .execute(conn)
        .await
        .context("Failed to update user")?;

        Ok(())
    }

    pub async fn set_role(conn: &mut SqliteConnection, id: Uuid, role_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET role_id = ?, updated_at = ? WHERE id = ?")
            .bind(role_id.to_string())
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to change user role")?;

        Ok(())
    }

    pub async fn set_active(conn: &mut SqliteConnection, id: Uuid, active: bool) -> Result<()> {
        sqlx::query("UPDATE users SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to change user state")?;

        Ok(())
    }

    /// Ids of users currently holding `role_id`
    pub async fn ids_with_role(conn: &mut SqliteConnection, role_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM users WHERE role_id = ? ORDER BY username")
            .bind(role_id.to_string())
            .fetch_all(conn)
            .await
            .context("Failed to list role members")?;

        Ok(ids.iter().map(|id| parse_uuid(id)).collect())
    }
}

pub(crate) async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<User>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
        .context("Failed to get user")?;

    Ok(row.map(row_to_user))
}

fn row_to_user(row: UserRow) -> User {
    User {
        id: parse_uuid(&row.id),
        username: row.username,
        email: row.email,
        full_name: row.full_name,
        password_hash: row.password_hash,
        role_id: parse_uuid(&row.role_id),
        is_admin: row.is_admin,
        active: row.active,
        last_login_at: row.last_login_at.as_deref().map(parse_db_timestamp),
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}
