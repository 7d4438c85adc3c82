//! Report repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, like_pattern, now_timestamp, parse_db_timestamp, parse_opt_uuid, parse_uuid};
use crate::models::{
    AssigneeFilter, BoundingBox, CountBucket, CreateReportRequest, DailyCount, MapQuery, Priority,
    PriorityCount, Report, ReportQuery, ReportSort, ReportTotals, SortOrder,
};

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: String,
    number: i64,
    folio: String,
    title: String,
    description: String,
    category_id: String,
    category_name: String,
    status_id: String,
    status_code: String,
    status_name: String,
    status_color: String,
    is_closed: bool,
    priority: String,
    latitude: f64,
    longitude: f64,
    address: Option<String>,
    reporter_name: Option<String>,
    reporter_email: Option<String>,
    reporter_phone: Option<String>,
    assigned_to: Option<String>,
    assignee_username: Option<String>,
    created_by: Option<String>,
    created_at: String,
    updated_at: String,
    resolved_at: Option<String>,
}

const SELECT_REPORT: &str = r#"
    SELECT r.id, r.number, r.folio, r.title, r.description,
           r.category_id, c.name AS category_name,
           r.status_id, s.code AS status_code, s.name AS status_name,
           s.color AS status_color, s.is_final AS is_closed,
           r.priority, r.latitude, r.longitude, r.address,
           r.reporter_name, r.reporter_email, r.reporter_phone,
           r.assigned_to, u.username AS assignee_username, r.created_by,
           r.created_at, r.updated_at, r.resolved_at
    FROM reports r
    JOIN categories c ON c.id = r.category_id
    JOIN report_statuses s ON s.id = r.status_id
    LEFT JOIN users u ON u.id = r.assigned_to
"#;

const PRIORITY_RANK: &str =
    "CASE r.priority WHEN 'low' THEN 1 WHEN 'medium' THEN 2 WHEN 'high' THEN 3 WHEN 'critical' THEN 4 ELSE 0 END";

/// Report listing filters resolved from query parameters
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub assignee: Option<AssigneeFilter>,
    pub open: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub bbox: Option<BoundingBox>,
}

impl ReportFilter {
    pub fn from_query(query: &ReportQuery, assignee: Option<AssigneeFilter>) -> Self {
        Self {
            status_id: query.status_id,
            category_id: query.category_id,
            priority: query.priority,
            assignee,
            open: query.open,
            from: query.from,
            to: query.to,
            text: query
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_lowercase),
            bbox: None,
        }
    }

    pub fn from_map_query(query: &MapQuery, bbox: Option<BoundingBox>) -> Self {
        Self {
            status_id: query.status_id,
            category_id: query.category_id,
            open: query.open_only.then_some(true),
            bbox,
            ..Default::default()
        }
    }

    fn apply(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1 = 1");

        if let Some(status_id) = self.status_id {
            builder.push(" AND r.status_id = ").push_bind(status_id.to_string());
        }
        if let Some(category_id) = self.category_id {
            builder.push(" AND r.category_id = ").push_bind(category_id.to_string());
        }
        if let Some(priority) = self.priority {
            builder.push(" AND r.priority = ").push_bind(priority.as_str());
        }
        match self.assignee {
            Some(AssigneeFilter::User(user_id)) => {
                builder.push(" AND r.assigned_to = ").push_bind(user_id.to_string());
            }
            Some(AssigneeFilter::Unassigned) => {
                builder.push(" AND r.assigned_to IS NULL");
            }
            None => {}
        }
        match self.open {
            Some(true) => {
                builder.push(" AND s.is_final = 0");
            }
            Some(false) => {
                builder.push(" AND s.is_final = 1");
            }
            None => {}
        }
        if let Some(from) = self.from {
            builder.push(" AND r.created_at >= ").push_bind(format_timestamp(from));
        }
        if let Some(to) = self.to {
            builder.push(" AND r.created_at <= ").push_bind(format_timestamp(to));
        }
        if let Some(ref text) = self.text {
            let pattern = like_pattern(text);
            builder
                .push(" AND (LOWER(r.folio) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'")
                .push(" OR LOWER(r.title) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'")
                .push(" OR LOWER(r.description) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'")
                .push(" OR LOWER(COALESCE(r.address, '')) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\'")
                .push(")");
        }
        if let Some(bbox) = self.bbox {
            builder
                .push(" AND r.longitude BETWEEN ")
                .push_bind(bbox.min_lon)
                .push(" AND ")
                .push_bind(bbox.max_lon)
                .push(" AND r.latitude BETWEEN ")
                .push_bind(bbox.min_lat)
                .push(" AND ")
                .push_bind(bbox.max_lat);
        }
    }
}

/// Values written when a report is filed
#[derive(Debug, Clone)]
pub struct NewReport<'r> {
    pub request: &'r CreateReportRequest,
    pub status_id: Uuid,
    pub priority: Priority,
    pub created_by: Option<Uuid>,
    pub folio_prefix: &'r str,
}

pub struct ReportRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReportRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Report>> {
        find_by_id(self.pool, id).await
    }

    /// One page of reports plus the total matching `filter`
    pub async fn list(
        &self,
        filter: &ReportFilter,
        sort: ReportSort,
        order: SortOrder,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Report>, i64)> {
        let mut count_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM reports r JOIN report_statuses s ON s.id = r.status_id",
        );
        filter.apply(&mut count_builder);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(self.pool)
            .await
            .context("Failed to count reports")?;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_REPORT);
        filter.apply(&mut builder);

        let column = match sort {
            ReportSort::CreatedAt => "r.created_at",
            ReportSort::UpdatedAt => "r.updated_at",
            ReportSort::Priority => PRIORITY_RANK,
            ReportSort::Number => "r.number",
        };
        let direction = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        builder
            .push(format!(" ORDER BY {column} {direction}, r.number {direction} LIMIT "))
            .push_bind(page_size as i64)
            .push(" OFFSET ")
            .push_bind(page.saturating_sub(1) as i64 * page_size as i64);

        let rows = builder
            .build_query_as::<ReportRow>()
            .fetch_all(self.pool)
            .await
            .context("Failed to list reports")?;

        Ok((rows.into_iter().map(row_to_report).collect(), total))
    }

    /// Reports with coordinates inside the filter, newest first
    pub async fn list_for_map(&self, filter: &ReportFilter, limit: u32) -> Result<Vec<Report>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_REPORT);
        filter.apply(&mut builder);
        builder
            .push(" ORDER BY r.created_at DESC LIMIT ")
            .push_bind(limit as i64);

        let rows = builder
            .build_query_as::<ReportRow>()
            .fetch_all(self.pool)
            .await
            .context("Failed to list report locations")?;

        Ok(rows.into_iter().map(row_to_report).collect())
    }

    /// Insert with the next sequential number. Number and folio are derived
    /// in the same statement so concurrent inserts cannot collide.
    pub async fn insert(conn: &mut SqliteConnection, new: &NewReport<'_>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = now_timestamp();
        let req = new.request;

        sqlx::query(
            r#"
            INSERT INTO reports (id, number, folio, title, description, category_id, status_id,
                                 priority, latitude, longitude, address, reporter_name,
                                 reporter_email, reporter_phone, created_by, created_at, updated_at)
            SELECT ?, n, printf('%s-%06d', ?, n), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            FROM (SELECT COALESCE(MAX(number), 0) + 1 AS n FROM reports)
            "#,
        )
        .bind(id.to_string())
        .bind(new.folio_prefix)
        .bind(req.title.trim())
        .bind(req.description.trim())
        .bind(req.category_id.to_string())
        .bind(new.status_id.to_string())
        .bind(new.priority.as_str())
        .bind(req.latitude)
        .bind(req.longitude)
        .bind(&req.address)
        .bind(&req.reporter_name)
        .bind(&req.reporter_email)
        .bind(&req.reporter_phone)
        .bind(new.created_by.map(|u| u.to_string()))
        .bind(&now)
        .bind(&now)
        .execute(conn)
        .await
        .context("Failed to create report")?;

        Ok(id)
    }

    /// Persist descriptive fields of `report`
    pub async fn update_details(conn: &mut SqliteConnection, report: &Report) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE reports
            SET title = ?, description = ?, latitude = ?, longitude = ?, address = ?,
                reporter_name = ?, reporter_email = ?, reporter_phone = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&report.title)
        .bind(&report.description)
        .bind(report.latitude)
        .bind(report.longitude)
        .bind(&report.address)
        .bind(&report.reporter_name)
        .bind(&report.reporter_email)
        .bind(&report.reporter_phone)
        .bind(now_timestamp())
        .bind(report.id.to_string())
        .execute(conn)
        .await
        .context("Failed to update report")?;

        Ok(())
    }

    /// Move to `status_id`; `resolved_at` must be `Some` iff the status is final
    pub async fn set_status(
        conn: &mut SqliteConnection,
        id: Uuid,
        status_id: Uuid,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE reports SET status_id = ?, resolved_at = ?, updated_at = ? WHERE id = ?")
            .bind(status_id.to_string())
            .bind(resolved_at.map(format_timestamp))
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to update report status")?;

        Ok(())
    }

    pub async fn set_assignee(conn: &mut SqliteConnection, id: Uuid, user_id: Option<Uuid>) -> Result<()> {
        sqlx::query("UPDATE reports SET assigned_to = ?, updated_at = ? WHERE id = ?")
            .bind(user_id.map(|u| u.to_string()))
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to update report assignee")?;

        Ok(())
    }

    pub async fn set_priority(conn: &mut SqliteConnection, id: Uuid, priority: Priority) -> Result<()> {
        sqlx::query("UPDATE reports SET priority = ?, updated_at = ? WHERE id = ?")
            .bind(priority.as_str())
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to update report priority")?;

        Ok(())
    }

    pub async fn set_category(conn: &mut SqliteConnection, id: Uuid, category_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE reports SET category_id = ?, updated_at = ? WHERE id = ?")
            .bind(category_id.to_string())
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to update report category")?;

        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to delete report")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn ids_in_status(conn: &mut SqliteConnection, status_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM reports WHERE status_id = ? ORDER BY number")
            .bind(status_id.to_string())
            .fetch_all(conn)
            .await
            .context("Failed to list reports by status")?;

        Ok(ids.iter().map(|id| parse_uuid(id)).collect())
    }

    pub async fn ids_in_category(conn: &mut SqliteConnection, category_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM reports WHERE category_id = ? ORDER BY number")
            .bind(category_id.to_string())
            .fetch_all(conn)
            .await
            .context("Failed to list reports by category")?;

        Ok(ids.iter().map(|id| parse_uuid(id)).collect())
    }

    /// Reports in a non-final status assigned to `user_id`
    pub async fn open_ids_assigned_to(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.id FROM reports r
            JOIN report_statuses s ON s.id = r.status_id
            WHERE r.assigned_to = ? AND s.is_final = 0
            ORDER BY r.number
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(conn)
        .await
        .context("Failed to list reports assigned to user")?;

        Ok(ids.iter().map(|id| parse_uuid(id)).collect())
    }

    /// Bring `resolved_at` in line after a status's `is_final` flag changed
    pub async fn sync_resolved_at(conn: &mut SqliteConnection, status_id: Uuid, is_final: bool) -> Result<u64> {
        let now = now_timestamp();
        let result = if is_final {
            sqlx::query(
                "UPDATE reports SET resolved_at = ?, updated_at = ? WHERE status_id = ? AND resolved_at IS NULL",
            )
            .bind(&now)
            .bind(&now)
            .bind(status_id.to_string())
            .execute(conn)
            .await
        } else {
            sqlx::query(
                "UPDATE reports SET resolved_at = NULL, updated_at = ? WHERE status_id = ? AND resolved_at IS NOT NULL",
            )
            .bind(&now)
            .bind(status_id.to_string())
            .execute(conn)
            .await
        }
        .context("Failed to sync report resolution times")?;

        Ok(result.rows_affected())
    }

    pub async fn totals(&self) -> Result<ReportTotals> {
        let (total, open, unassigned_open): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN s.is_final = 0 THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN s.is_final = 0 AND r.assigned_to IS NULL THEN 1 ELSE 0 END), 0)
            FROM reports r
            JOIN report_statuses s ON s.id = r.status_id
            "#,
        )
        .fetch_one(self.pool)
        .await
        .context("Failed to compute report totals")?;

        Ok(ReportTotals {
            total,
            open,
            closed: total - open,
            unassigned_open,
        })
    }

    /// Every active status, including those with no reports, in workflow order
    pub async fn count_by_status(&self) -> Result<Vec<CountBucket>> {
        let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT s.id, s.name, s.color, COUNT(r.id)
            FROM report_statuses s
            LEFT JOIN reports r ON r.status_id = s.id
            WHERE s.active = 1 OR r.id IS NOT NULL
            GROUP BY s.id, s.name, s.color, s.sort_order
            ORDER BY s.sort_order, s.name
            "#,
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to count reports by status")?;

        Ok(rows
            .into_iter()
            .map(|(id, name, color, count)| CountBucket {
                id: Some(parse_uuid(&id)),
                label: name,
                color: Some(color),
                count,
            })
            .collect())
    }

    pub async fn count_by_category(&self) -> Result<Vec<CountBucket>> {
        let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.color, COUNT(r.id) AS total
            FROM categories c
            LEFT JOIN reports r ON r.category_id = c.id
            WHERE c.active = 1 OR r.id IS NOT NULL
            GROUP BY c.id, c.name, c.color
            ORDER BY total DESC, c.name
            "#,
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to count reports by category")?;

        Ok(rows
            .into_iter()
            .map(|(id, name, color, count)| CountBucket {
                id: Some(parse_uuid(&id)),
                label: name,
                color: Some(color),
                count,
            })
            .collect())
    }

    /// All priorities, zero-filled, most urgent first
    pub async fn count_by_priority(&self) -> Result<Vec<PriorityCount>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT priority, COUNT(*) FROM reports GROUP BY priority")
                .fetch_all(self.pool)
                .await
                .context("Failed to count reports by priority")?;

        let mut counts: Vec<PriorityCount> = Priority::all()
            .into_iter()
            .rev()
            .map(|priority| PriorityCount { priority, count: 0 })
            .collect();
        for (priority, count) in rows {
            if let Ok(priority) = priority.parse::<Priority>() {
                if let Some(bucket) = counts.iter_mut().find(|c| c.priority == priority) {
                    bucket.count = count;
                }
            }
        }

        Ok(counts)
    }

    /// Open reports per assignee; unassigned reports get a `None` id
    pub async fn open_by_assignee(&self) -> Result<Vec<CountBucket>> {
        let rows: Vec<(Option<String>, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT r.assigned_to, u.username, COUNT(*) AS total
            FROM reports r
            JOIN report_statuses s ON s.id = r.status_id
            LEFT JOIN users u ON u.id = r.assigned_to
            WHERE s.is_final = 0
            GROUP BY r.assigned_to, u.username
            ORDER BY total DESC, u.username
            "#,
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to count open reports by assignee")?;

        Ok(rows
            .into_iter()
            .map(|(id, username, count)| CountBucket {
                id: parse_opt_uuid(id),
                label: username.unwrap_or_else(|| "unassigned".to_string()),
                color: None,
                count,
            })
            .collect())
    }

    /// Mean hours between creation and resolution of closed reports
    pub async fn avg_resolution_hours(&self) -> Result<Option<f64>> {
        let avg: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT AVG((julianday(resolved_at) - julianday(created_at)) * 24.0)
            FROM reports
            WHERE resolved_at IS NOT NULL
            "#,
        )
        .fetch_one(self.pool)
        .await
        .context("Failed to compute resolution time")?;

        Ok(avg)
    }

    /// Reports created per UTC day since `since`, days without reports omitted
    pub async fn created_per_day(&self, since: DateTime<Utc>) -> Result<Vec<DailyCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT substr(created_at, 1, 10) AS day, COUNT(*)
            FROM reports
            WHERE created_at >= ?
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(format_timestamp(since))
        .fetch_all(self.pool)
        .await
        .context("Failed to count reports per day")?;

        Ok(rows
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect())
    }
}

pub(crate) async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Report>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, ReportRow>(&format!("{SELECT_REPORT} WHERE r.id = ?"))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
        .context("Failed to get report")?;

    Ok(row.map(row_to_report))
}

fn row_to_report(row: ReportRow) -> Report {
    Report {
        id: parse_uuid(&row.id),
        number: row.number,
        folio: row.folio,
        title: row.title,
        description: row.description,
        category_id: parse_uuid(&row.category_id),
        category_name: row.category_name,
        status_id: parse_uuid(&row.status_id),
        status_code: row.status_code,
        status_name: row.status_name,
        status_color: row.status_color,
        is_closed: row.is_closed,
        priority: row.priority.parse().unwrap_or_default(),
        latitude: row.latitude,
        longitude: row.longitude,
        address: row.address,
        reporter_name: row.reporter_name,
        reporter_email: row.reporter_email,
        reporter_phone: row.reporter_phone,
        assigned_to: parse_opt_uuid(row.assigned_to),
        assignee_username: row.assignee_username,
        created_by: parse_opt_uuid(row.created_by),
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
        resolved_at: row.resolved_at.as_deref().map(parse_db_timestamp),
    }
}
