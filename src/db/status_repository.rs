//! Report status repository

use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::{now_timestamp, parse_db_timestamp, parse_uuid};
use crate::models::{CreateStatusRequest, ReportStatus};

#[derive(Debug, sqlx::FromRow)]
struct StatusRow {
    id: String,
    code: String,
    name: String,
    description: Option<String>,
    color: String,
    sort_order: i64,
    is_initial: bool,
    is_final: bool,
    active: bool,
    created_at: String,
    updated_at: String,
}

const SELECT_STATUS: &str = r#"
    SELECT id, code, name, description, color, sort_order, is_initial, is_final, active,
           created_at, updated_at
    FROM report_statuses
"#;

const DEFAULT_COLOR: &str = "#6B7280";

pub struct StatusRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StatusRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<ReportStatus>> {
        let sql = if include_inactive {
            format!("{SELECT_STATUS} ORDER BY sort_order, name")
        } else {
            format!("{SELECT_STATUS} WHERE active = 1 ORDER BY sort_order, name")
        };
        let rows = sqlx::query_as::<_, StatusRow>(&sql)
            .fetch_all(self.pool)
            .await
            .context("Failed to list statuses")?;

        Ok(rows.into_iter().map(row_to_status).collect())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<ReportStatus>> {
        find_by_id(self.pool, id).await
    }

    pub async fn insert(conn: &mut SqliteConnection, req: &CreateStatusRequest) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO report_statuses (id, code, name, description, color, sort_order,
                                         is_initial, is_final, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&req.code)
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(req.color.as_deref().unwrap_or(DEFAULT_COLOR))
        .bind(req.sort_order)
        .bind(req.is_initial)
        .bind(req.is_final)
        .bind(&now)
        .bind(&now)
        .execute(conn)
        .await
        .context("Failed to create status")?;

        Ok(id)
    }

    pub async fn update(conn: &mut SqliteConnection, status: &ReportStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE report_statuses
            SET name = ?, description = ?, color = ?, sort_order = ?, is_initial = ?,
                is_final = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&status.name)
        .bind(&status.description)
        .bind(&status.color)
        .bind(status.sort_order)
        .bind(status.is_initial)
        .bind(status.is_final)
        .bind(now_timestamp())
        .bind(status.id.to_string())
        .execute(conn)
        .await
        .context("Failed to update status")?;

        Ok(())
    }

    pub async fn set_active(conn: &mut SqliteConnection, id: Uuid, active: bool) -> Result<()> {
        sqlx::query("UPDATE report_statuses SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to change status state")?;

        Ok(())
    }

    /// Drop the initial flag from every status except `keep`
    pub async fn clear_initial_except(conn: &mut SqliteConnection, keep: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE report_statuses SET is_initial = 0, updated_at = ? WHERE is_initial = 1 AND id != ?",
        )
        .bind(now_timestamp())
        .bind(keep.to_string())
        .execute(conn)
        .await
        .context("Failed to clear initial status flag")?;

        Ok(result.rows_affected())
    }
}

pub(crate) async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<ReportStatus>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, StatusRow>(&format!("{SELECT_STATUS} WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
        .context("Failed to get status")?;

    Ok(row.map(row_to_status))
}

/// The active status new reports start in
pub(crate) async fn find_initial<'e, E>(executor: E) -> Result<Option<ReportStatus>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, StatusRow>(&format!(
        "{SELECT_STATUS} WHERE is_initial = 1 AND active = 1 ORDER BY sort_order LIMIT 1"
    ))
    .fetch_optional(executor)
    .await
    .context("Failed to get initial status")?;

    Ok(row.map(row_to_status))
}

fn row_to_status(row: StatusRow) -> ReportStatus {
    ReportStatus {
        id: parse_uuid(&row.id),
        code: row.code,
        name: row.name,
        description: row.description,
        color: row.color,
        sort_order: row.sort_order,
        is_initial: row.is_initial,
        is_final: row.is_final,
        active: row.active,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}
