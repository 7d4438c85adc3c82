//! History repository
//!
//! Insert and select only. The table also carries triggers that abort any
//! UPDATE or DELETE.

use anyhow::{Context, Result};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::{now_timestamp, parse_db_timestamp, parse_opt_uuid, parse_uuid};
use crate::models::{EntityType, HistoryAction, HistoryEntry, HistoryQuery, NewHistoryEntry};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: String,
    entity_type: String,
    entity_id: String,
    action: String,
    field: Option<String>,
    old_value: Option<String>,
    new_value: Option<String>,
    comment: Option<String>,
    actor_id: Option<String>,
    created_at: String,
}

const SELECT_HISTORY: &str = r#"
    SELECT id, entity_type, entity_id, action, field, old_value, new_value, comment,
           actor_id, created_at
    FROM history
"#;

pub struct HistoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> HistoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry, on the pool or inside a caller's transaction
    pub async fn record<'e, E>(executor: E, entry: &NewHistoryEntry) -> Result<HistoryEntry>
    where
        E: SqliteExecutor<'e>,
    {
        let id = Uuid::new_v4();
        let created_at = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO history (id, entity_type, entity_id, action, field, old_value,
                                 new_value, comment, actor_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id.to_string())
        .bind(entry.action.as_str())
        .bind(&entry.field)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(&entry.comment)
        .bind(entry.actor_id.map(|a| a.to_string()))
        .bind(&created_at)
        .execute(executor)
        .await
        .context("Failed to record history entry")?;

        Ok(HistoryEntry {
            id,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            action: entry.action,
            field: entry.field.clone(),
            old_value: entry.old_value.clone(),
            new_value: entry.new_value.clone(),
            comment: entry.comment.clone(),
            actor_id: entry.actor_id,
            created_at: parse_db_timestamp(&created_at),
        })
    }

    /// Newest first
    pub async fn list(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_HISTORY);
        builder.push(" WHERE 1 = 1");

        if let Some(entity_type) = query.entity_type {
            builder.push(" AND entity_type = ").push_bind(entity_type.as_str());
        }
        if let Some(entity_id) = query.entity_id {
            builder.push(" AND entity_id = ").push_bind(entity_id.to_string());
        }
        if let Some(actor_id) = query.actor_id {
            builder.push(" AND actor_id = ").push_bind(actor_id.to_string());
        }
        if let Some(action) = query.action {
            builder.push(" AND action = ").push_bind(action.as_str());
        }

        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        builder
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(query.offset.unwrap_or(0) as i64);

        let rows = builder
            .build_query_as::<HistoryRow>()
            .fetch_all(self.pool)
            .await
            .context("Failed to list history")?;

        rows.into_iter().map(row_to_entry).collect()
    }

    pub async fn for_entity(&self, entity_type: EntityType, entity_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "{SELECT_HISTORY} WHERE entity_type = ? AND entity_id = ? ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(entity_type.as_str())
        .bind(entity_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to get entity history")?;

        rows.into_iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: HistoryRow) -> Result<HistoryEntry> {
    let entity_type: EntityType = row
        .entity_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let action: HistoryAction = row.action.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    Ok(HistoryEntry {
        id: parse_uuid(&row.id),
        entity_type,
        entity_id: parse_uuid(&row.entity_id),
        action,
        field: row.field,
        old_value: row.old_value,
        new_value: row.new_value,
        comment: row.comment,
        actor_id: parse_opt_uuid(row.actor_id),
        created_at: parse_db_timestamp(&row.created_at),
    })
}
