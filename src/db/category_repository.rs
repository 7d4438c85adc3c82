//! Category repository

use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::{now_timestamp, parse_db_timestamp, parse_uuid};
use crate::models::{Category, CreateCategoryRequest};

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    description: Option<String>,
    color: String,
    icon: Option<String>,
    active: bool,
    created_at: String,
    updated_at: String,
}

const SELECT_CATEGORY: &str = r#"
    SELECT id, name, description, color, icon, active, created_at, updated_at
    FROM categories
"#;

const DEFAULT_COLOR: &str = "#6B7280";

pub struct CategoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CategoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Category>> {
        let sql = if include_inactive {
            format!("{SELECT_CATEGORY} ORDER BY name")
        } else {
            format!("{SELECT_CATEGORY} WHERE active = 1 ORDER BY name")
        };
        let rows = sqlx::query_as::<_, CategoryRow>(&sql)
            .fetch_all(self.pool)
            .await
            .context("Failed to list categories")?;

        Ok(rows.into_iter().map(row_to_category).collect())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Category>> {
        find_by_id(self.pool, id).await
    }

    pub async fn insert(conn: &mut SqliteConnection, req: &CreateCategoryRequest) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, color, icon, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(req.color.as_deref().unwrap_or(DEFAULT_COLOR))
        .bind(&req.icon)
        .bind(&now)
        .bind(&now)
        .execute(conn)
        .await
        .context("Failed to create category")?;

        Ok(id)
    }

    pub async fn update(conn: &mut SqliteConnection, category: &Category) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE categories
            SET name = ?, description = ?, color = ?, icon = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.color)
        .bind(&category.icon)
        .bind(now_timestamp())
        .bind(category.id.to_string())
        .execute(conn)
        .await
        .context("Failed to update category")?;

        Ok(())
    }

    pub async fn set_active(conn: &mut SqliteConnection, id: Uuid, active: bool) -> Result<()> {
        sqlx::query("UPDATE categories SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to change category state")?;

        Ok(())
    }
}

pub(crate) async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Category>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, CategoryRow>(&format!("{SELECT_CATEGORY} WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
        .context("Failed to get category")?;

    Ok(row.map(row_to_category))
}

fn row_to_category(row: CategoryRow) -> Category {
    Category {
        id: parse_uuid(&row.id),
        name: row.name,
        description: row.description,
        color: row.color,
        icon: row.icon,
        active: row.active,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}
