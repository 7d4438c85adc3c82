//! Notification service
//!
//! Persists per-user notifications and fans them out to live SSE
//! subscribers through a broadcast channel.

use crate::models::{NewNotification, Notification, NotificationQuery, NotificationStats};
use crate::db::now_timestamp;
use crate::utils::AppError;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    db: Pool<Sqlite>,
    broadcast: Arc<broadcast::Sender<NotificationEvent>>,
}

/// Notification event for broadcasting
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    New(Notification),
    Updated(Notification),
    AllRead { user_id: String },
}

impl NotificationEvent {
    /// Owner of the notification the event is about
    pub fn user_id(&self) -> &str {
        match self {
            NotificationEvent::New(n) | NotificationEvent::Updated(n) => &n.user_id,
            NotificationEvent::AllRead { user_id } => user_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NotificationEvent::New(_) => "notification",
            NotificationEvent::Updated(_) => "notification_updated",
            NotificationEvent::AllRead { .. } => "notifications_read",
        }
    }
}

impl NotificationService {
    pub fn new(db: Pool<Sqlite>) -> Self {
        let (tx, _) = broadcast::channel(1000);
        Self {
            db,
            broadcast: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.broadcast.subscribe()
    }

    /// Store a notification and push it to live subscribers
    pub async fn notify(&self, new: NewNotification) -> Result<Notification, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_timestamp();

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, title, message, kind, link, read, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            RETURNING id, user_id, title, message, kind, link, read, created_at, read_at
            "#,
        )
        .bind(&id)
        .bind(&new.user_id)
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.kind.as_str())
        .bind(&new.link)
        .bind(&created_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(user_id = %new.user_id, kind = %new.kind, "Notification created");

        // No receivers is not an error
        let _ = self.broadcast.send(NotificationEvent::New(notification.clone()));

        Ok(notification)
    }

    /// Deliver a batch, logging failures instead of returning them.
    ///
    /// Used after a state change has been committed: the change stands even
    /// if a notification cannot be stored.
    pub async fn notify_all(&self, batch: Vec<NewNotification>) {
        for new in batch {
            let user_id = new.user_id.clone();
            if let Err(e) = self.notify(new).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to deliver notification");
            }
        }
    }

    /// Newest first
    pub async fn list(
        &self,
        user_id: &str,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, AppError> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let unread_clause = if query.unread_only == Some(true) {
            "AND read = 0"
        } else {
            ""
        };

        let sql = format!(
            r#"
            SELECT id, user_id, title, message, kind, link, read, created_at, read_at
            FROM notifications
            WHERE user_id = ? {unread_clause}
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#
        );

        sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a notification as read/unread
    pub async fn mark_as_read(
        &self,
        notification_id: &str,
        user_id: &str,
        read: bool,
    ) -> Result<Notification, AppError> {
        let read_at = read.then(now_timestamp);

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET read = ?, read_at = ?
            WHERE id = ? AND user_id = ?
            RETURNING id, user_id, title, message, kind, link, read, created_at, read_at
            "#,
        )
        .bind(read)
        .bind(&read_at)
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        let _ = self
            .broadcast
            .send(NotificationEvent::Updated(notification.clone()));

        Ok(notification)
    }

    /// Mark all notifications as read for a user
    pub async fn mark_all_as_read(&self, user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read = 1, read_at = ?
            WHERE user_id = ? AND read = 0
            "#,
        )
        .bind(now_timestamp())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() > 0 {
            let _ = self.broadcast.send(NotificationEvent::AllRead {
                user_id: user_id.to_string(),
            });
        }

        Ok(result.rows_affected())
    }

    pub async fn get_stats(&self, user_id: &str) -> Result<NotificationStats, AppError> {
        let (total, unread): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(CASE WHEN read = 0 THEN 1 ELSE 0 END), 0)
            FROM notifications
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(NotificationStats { total, unread })
    }
}
