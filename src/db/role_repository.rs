//! Role repository

use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::{now_timestamp, parse_db_timestamp, parse_uuid};
use crate::models::{CreateRoleRequest, Permission, Role};

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: String,
    name: String,
    display_name: String,
    description: Option<String>,
    permissions: String,
    is_system: bool,
    active: bool,
    created_at: String,
    updated_at: String,
}

const SELECT_ROLE: &str = r#"
    SELECT id, name, display_name, description, permissions, is_system, active,
           created_at, updated_at
    FROM roles
"#;

pub struct RoleRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoleRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Role>> {
        let sql = if include_inactive {
            format!("{SELECT_ROLE} ORDER BY is_system DESC, name")
        } else {
            format!("{SELECT_ROLE} WHERE active = 1 ORDER BY is_system DESC, name")
        };
        let rows = sqlx::query_as::<_, RoleRow>(&sql)
            .fetch_all(self.pool)
            .await
            .context("Failed to list roles")?;

        rows.into_iter().map(row_to_role).collect()
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Role>> {
        find_by_id(self.pool, id).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!("{SELECT_ROLE} WHERE name = ?"))
            .bind(name)
            .fetch_optional(self.pool)
            .await
            .context("Failed to get role by name")?;

        row.map(row_to_role).transpose()
    }

    pub async fn create(conn: &mut SqliteConnection, req: &CreateRoleRequest) -> Result<Role> {
        let id = Uuid::new_v4();
        let now = now_timestamp();
        let permissions = encode_permissions(&req.permissions)?;

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, display_name, description, permissions,
                               is_system, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, 1, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&req.name)
        .bind(&req.display_name)
        .bind(&req.description)
        .bind(&permissions)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await
        .context("Failed to create role")?;

        find_by_id(conn, id)
            .await?
            .context("Failed to retrieve created role")
    }

    /// Persist the descriptive fields and permissions of `role`
    pub async fn update(conn: &mut SqliteConnection, role: &Role) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE roles
            SET name = ?, display_name = ?, description = ?, permissions = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&role.name)
        .bind(&role.display_name)
        .bind(&role.description)
        .bind(encode_permissions(&role.permissions)?)
        .bind(now_timestamp())
        .bind(role.id.to_string())
        .execute(conn)
        .await
        .context("Failed to update role")?;

        Ok(())
    }

    /// Delete a custom role only while no user holds it. Returns false when
    /// the row was kept.
    pub async fn delete_unused(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM roles
            WHERE id = ? AND is_system = 0
              AND NOT EXISTS (SELECT 1 FROM users WHERE users.role_id = roles.id)
            "#,
        )
        .bind(id.to_string())
        .execute(conn)
        .await
        .context("Failed to delete role")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_users(conn: &mut SqliteConnection, id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = ?")
            .bind(id.to_string())
            .fetch_one(conn)
            .await
            .context("Failed to count role members")?;

        Ok(count)
    }

    pub async fn set_active(conn: &mut SqliteConnection, id: Uuid, active: bool) -> Result<()> {
        sqlx::query("UPDATE roles SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to change role state")?;

        Ok(())
    }
}

pub(crate) async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Role>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, RoleRow>(&format!("{SELECT_ROLE} WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
        .context("Failed to get role")?;

    row.map(row_to_role).transpose()
}

fn encode_permissions(permissions: &[Permission]) -> Result<String> {
    serde_json::to_string(permissions).context("Failed to encode permissions")
}

fn row_to_role(row: RoleRow) -> Result<Role> {
    let permissions: Vec<Permission> = serde_json::from_str(&row.permissions)
        .with_context(|| format!("Invalid permissions stored for role {}", row.name))?;

    Ok(Role {
        id: parse_uuid(&row.id),
        name: row.name,
        display_name: row.display_name,
        description: row.description,
        permissions,
        is_system: row.is_system,
        active: row.active,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    })
}
