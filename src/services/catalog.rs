//! Category and status catalogs
//!
//! Deactivating an entry that reports still point to moves those reports in
//! the same transaction, with one history entry per moved report.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, CategoryRepository, HistoryRepository, ReportRepository, StatusRepository};
use crate::models::{
    CascadeSummary, Category, CreateCategoryRequest, CreateStatusRequest, DeactivateRequest,
    EntityType, HistoryAction, NewHistoryEntry, ReportStatus, UpdateCategoryRequest,
    UpdateStatusRequest,
};
use crate::services::notification::NotificationService;
use crate::services::reports::{apply_category_change, apply_status_change, load_report};
use crate::utils::{AppError, AppResult};

pub struct CatalogService {
    pool: SqlitePool,
    notifications: NotificationService,
}

impl CatalogService {
    pub fn new(pool: SqlitePool, notifications: NotificationService) -> Self {
        Self { pool, notifications }
    }

    // ---------------------------------------------------------------------
    // Categories
    // ---------------------------------------------------------------------

    pub async fn list_categories(&self, include_inactive: bool) -> AppResult<Vec<Category>> {
        Ok(CategoryRepository::new(&self.pool).list(include_inactive).await?)
    }

    pub async fn get_category(&self, id: Uuid) -> AppResult<Category> {
        CategoryRepository::new(&self.pool)
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Category {} not found", id)))
    }

    pub async fn create_category(&self, req: CreateCategoryRequest, actor: Uuid) -> AppResult<Category> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let id = CategoryRepository::insert(&mut tx, &req).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::new(EntityType::Category, id, HistoryAction::Created)
                .change("name", None::<String>, Some(req.name.trim()))
                .actor(Some(actor)),
        )
        .await?;
        let category = load_category(&mut tx, id).await?;
        tx.commit().await?;

        info!(category_id = %id, name = %category.name, actor = %actor, "Category created");
        Ok(category)
    }

    pub async fn update_category(&self, id: Uuid, req: UpdateCategoryRequest, actor: Uuid) -> AppResult<Category> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut category = load_category(&mut tx, id).await?;
        let mut changes = Vec::new();

        if let Some(name) = req.name.map(|n| n.trim().to_string()) {
            if name != category.name {
                changes.push(("name", Some(category.name.clone()), Some(name.clone())));
                category.name = name;
            }
        }
        if let Some(color) = req.color {
            if color != category.color {
                changes.push(("color", Some(category.color.clone()), Some(color.clone())));
                category.color = color;
            }
        }
        if req.description.is_some() && req.description != category.description {
            changes.push(("description", category.description.clone(), req.description.clone()));
            category.description = req.description;
        }
        if req.icon.is_some() && req.icon != category.icon {
            changes.push(("icon", category.icon.clone(), req.icon.clone()));
            category.icon = req.icon;
        }

        if changes.is_empty() {
            debug!(category_id = %id, "Category update without changes");
            return Ok(category);
        }

        CategoryRepository::update(&mut tx, &category).await?;
        record_changes(&mut tx, EntityType::Category, id, changes, actor).await?;
        let category = load_category(&mut tx, id).await?;
        tx.commit().await?;

        info!(category_id = %id, actor = %actor, "Category updated");
        Ok(category)
    }

    /// Deactivate a category. With a replacement, its reports move there;
    /// without one they keep the category.
    pub async fn deactivate_category(
        &self,
        id: Uuid,
        req: DeactivateRequest,
        actor: Uuid,
    ) -> AppResult<CascadeSummary> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let category = load_category(&mut tx, id).await?;

        if !category.active {
            debug!(category_id = %id, "Category already inactive");
            return Ok(CascadeSummary {
                entity_id: id,
                affected: 0,
                replacement_id: None,
            });
        }

        let replacement = match req.replacement_id {
            Some(replacement_id) => {
                if replacement_id == id {
                    return Err(AppError::conflict("A category cannot replace itself"));
                }
                let target = db::category_repository::find_by_id(&mut *tx, replacement_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::bad_request(format!("Category {} not found", replacement_id))
                    })?;
                if !target.active {
                    return Err(AppError::conflict(format!(
                        "Replacement category '{}' is inactive",
                        target.name
                    )));
                }
                Some(target)
            }
            None => None,
        };

        let mut affected = 0;
        if let Some(ref target) = replacement {
            let comment = format!("Category '{}' deactivated", category.name);
            for report_id in ReportRepository::ids_in_category(&mut tx, id).await? {
                let report = load_report(&mut tx, report_id).await?;
                apply_category_change(&mut tx, &report, target, Some(actor), Some(comment.clone())).await?;
                affected += 1;
            }
        }

        CategoryRepository::set_active(&mut tx, id, false).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::new(EntityType::Category, id, HistoryAction::Deactivated)
                .change(
                    "replacement",
                    None::<String>,
                    replacement.as_ref().map(|c| c.name.as_str()),
                )
                .comment(req.comment)
                .actor(Some(actor)),
        )
        .await?;
        tx.commit().await?;

        info!(
            category_id = %id,
            replacement = ?replacement.as_ref().map(|c| c.id),
            affected,
            actor = %actor,
            "Category deactivated"
        );

        Ok(CascadeSummary {
            entity_id: id,
            affected,
            replacement_id: replacement.map(|c| c.id),
        })
    }

    pub async fn activate_category(&self, id: Uuid, actor: Uuid) -> AppResult<Category> {
        let mut tx = self.pool.begin().await?;
        let category = load_category(&mut tx, id).await?;
        if category.active {
            debug!(category_id = %id, "Category already active");
            return Ok(category);
        }

        CategoryRepository::set_active(&mut tx, id, true).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::new(EntityType::Category, id, HistoryAction::Activated).actor(Some(actor)),
        )
        .await?;
        let category = load_category(&mut tx, id).await?;
        tx.commit().await?;

        info!(category_id = %id, actor = %actor, "Category activated");
        Ok(category)
    }

    // ---------------------------------------------------------------------
    // Statuses
    // ---------------------------------------------------------------------

    pub async fn list_statuses(&self, include_inactive: bool) -> AppResult<Vec<ReportStatus>> {
        Ok(StatusRepository::new(&self.pool).list(include_inactive).await?)
    }

    pub async fn get_status(&self, id: Uuid) -> AppResult<ReportStatus> {
        StatusRepository::new(&self.pool)
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Status {} not found", id)))
    }

    pub async fn create_status(&self, req: CreateStatusRequest, actor: Uuid) -> AppResult<ReportStatus> {
        req.validate()?;
        check_flags(req.is_initial, req.is_final)?;

        let mut tx = self.pool.begin().await?;
        let id = StatusRepository::insert(&mut tx, &req).await?;
        if req.is_initial {
            StatusRepository::clear_initial_except(&mut tx, id).await?;
        }
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::new(EntityType::Status, id, HistoryAction::Created)
                .change("code", None::<String>, Some(req.code.as_str()))
                .actor(Some(actor)),
        )
        .await?;
        let status = load_status(&mut tx, id).await?;
        tx.commit().await?;

        info!(status_id = %id, status = %status.code, actor = %actor, "Status created");
        Ok(status)
    }

    /// Update a status. Toggling `is_final` recomputes `resolved_at` for the
    /// reports currently in it.
    pub async fn update_status(&self, id: Uuid, req: UpdateStatusRequest, actor: Uuid) -> AppResult<ReportStatus> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut status = load_status(&mut tx, id).await?;
        let mut changes = Vec::new();

        if let Some(name) = req.name.map(|n| n.trim().to_string()) {
            if name != status.name {
                changes.push(("name", Some(status.name.clone()), Some(name.clone())));
                status.name = name;
            }
        }
        if req.description.is_some() && req.description != status.description {
            changes.push(("description", status.description.clone(), req.description.clone()));
            status.description = req.description;
        }
        if let Some(color) = req.color {
            if color != status.color {
                changes.push(("color", Some(status.color.clone()), Some(color.clone())));
                status.color = color;
            }
        }
        if let Some(sort_order) = req.sort_order {
            if sort_order != status.sort_order {
                changes.push((
                    "sort_order",
                    Some(status.sort_order.to_string()),
                    Some(sort_order.to_string()),
                ));
                status.sort_order = sort_order;
            }
        }

        let was_initial = status.is_initial;
        let was_final = status.is_final;
        if let Some(is_initial) = req.is_initial {
            if is_initial != status.is_initial {
                if !is_initial {
                    return Err(AppError::conflict(
                        "Mark another status as initial instead of clearing the flag",
                    ));
                }
                if !status.active {
                    return Err(AppError::conflict("An inactive status cannot be initial"));
                }
                changes.push(("is_initial", Some("false".into()), Some("true".into())));
                status.is_initial = true;
            }
        }
        if let Some(is_final) = req.is_final {
            if is_final != status.is_final {
                changes.push((
                    "is_final",
                    Some(status.is_final.to_string()),
                    Some(is_final.to_string()),
                ));
                status.is_final = is_final;
            }
        }
        check_flags(status.is_initial, status.is_final)?;

        if changes.is_empty() {
            debug!(status_id = %id, "Status update without changes");
            return Ok(status);
        }

        StatusRepository::update(&mut tx, &status).await?;
        if status.is_initial && !was_initial {
            StatusRepository::clear_initial_except(&mut tx, id).await?;
        }
        let resynced = if status.is_final != was_final {
            ReportRepository::sync_resolved_at(&mut tx, id, status.is_final).await?
        } else {
            0
        };
        record_changes(&mut tx, EntityType::Status, id, changes, actor).await?;
        let status = load_status(&mut tx, id).await?;
        tx.commit().await?;

        info!(status_id = %id, status = %status.code, resynced, actor = %actor, "Status updated");
        Ok(status)
    }

    /// Deactivate a status, moving its reports to the replacement or, when
    /// none is given, to the initial status.
    pub async fn deactivate_status(
        &self,
        id: Uuid,
        req: DeactivateRequest,
        actor: Uuid,
    ) -> AppResult<CascadeSummary> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let status = load_status(&mut tx, id).await?;

        if !status.active {
            debug!(status_id = %id, "Status already inactive");
            return Ok(CascadeSummary {
                entity_id: id,
                affected: 0,
                replacement_id: None,
            });
        }

        let target = match req.replacement_id {
            Some(replacement_id) => {
                if replacement_id == id {
                    return Err(AppError::conflict("A status cannot replace itself"));
                }
                let target = db::status_repository::find_by_id(&mut *tx, replacement_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::bad_request(format!("Status {} not found", replacement_id))
                    })?;
                if !target.active {
                    return Err(AppError::conflict(format!(
                        "Replacement status '{}' is inactive",
                        target.code
                    )));
                }
                target
            }
            None => {
                if status.is_initial {
                    return Err(AppError::conflict(
                        "The initial status can only be deactivated with a replacement",
                    ));
                }
                db::status_repository::find_initial(&mut *tx)
                    .await?
                    .ok_or_else(|| AppError::conflict("No active initial status to move reports to"))?
            }
        };

        // The replacement inherits the initial flag
        if status.is_initial {
            if target.is_final {
                return Err(AppError::conflict(format!(
                    "Final status '{}' cannot become the initial status",
                    target.code
                )));
            }
            let mut promoted = target.clone();
            promoted.is_initial = true;
            StatusRepository::update(&mut tx, &promoted).await?;
            StatusRepository::clear_initial_except(&mut tx, target.id).await?;
            HistoryRepository::record(
                &mut *tx,
                &NewHistoryEntry::new(EntityType::Status, target.id, HistoryAction::Updated)
                    .change("is_initial", Some("false"), Some("true"))
                    .comment(Some(format!("Replaces deactivated status '{}'", status.code)))
                    .actor(Some(actor)),
            )
            .await?;
        }

        let comment = format!("Status '{}' deactivated", status.code);
        let mut notices = Vec::new();
        let mut affected = 0;
        for report_id in ReportRepository::ids_in_status(&mut tx, id).await? {
            let report = load_report(&mut tx, report_id).await?;
            if let Some(notice) =
                apply_status_change(&mut tx, &report, &target, Some(actor), Some(comment.clone())).await?
            {
                if notice.user_id != actor.to_string() {
                    notices.push(notice);
                }
            }
            affected += 1;
        }

        StatusRepository::set_active(&mut tx, id, false).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::new(EntityType::Status, id, HistoryAction::Deactivated)
                .change("replacement", None::<String>, Some(target.code.as_str()))
                .comment(req.comment)
                .actor(Some(actor)),
        )
        .await?;
        tx.commit().await?;

        info!(
            status_id = %id,
            status = %status.code,
            replacement = %target.code,
            affected,
            actor = %actor,
            "Status deactivated"
        );

        if !notices.is_empty() {
            self.notifications.notify_all(notices).await;
        }

        Ok(CascadeSummary {
            entity_id: id,
            affected,
            replacement_id: Some(target.id),
        })
    }

    pub async fn activate_status(&self, id: Uuid, actor: Uuid) -> AppResult<ReportStatus> {
        let mut tx = self.pool.begin().await?;
        let status = load_status(&mut tx, id).await?;
        if status.active {
            debug!(status_id = %id, "Status already active");
            return Ok(status);
        }
        StatusRepository::set_active(&mut tx, id, true).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::new(EntityType::Status, id, HistoryAction::Activated).actor(Some(actor)),
        )
        .await?;
        let status = load_status(&mut tx, id).await?;
        tx.commit().await?;

        info!(status_id = %id, status = %status.code, actor = %actor, "Status activated");
        Ok(status)
    }
}

fn check_flags(is_initial: bool, is_final: bool) -> AppResult<()> {
    if is_initial && is_final {
        return Err(AppError::bad_request("A status cannot be both initial and final"));
    }
    Ok(())
}

async fn load_category(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Category> {
    db::category_repository::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Category {} not found", id)))
}

async fn load_status(conn: &mut SqliteConnection, id: Uuid) -> AppResult<ReportStatus> {
    db::status_repository::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Status {} not found", id)))
}

async fn record_changes(
    conn: &mut SqliteConnection,
    entity_type: EntityType,
    id: Uuid,
    changes: Vec<(&str, Option<String>, Option<String>)>,
    actor: Uuid,
) -> AppResult<()> {
    for (field, old, new) in changes {
        HistoryRepository::record(
            &mut *conn,
            &NewHistoryEntry::new(entity_type, id, HistoryAction::Updated)
                .change(field, old, new)
                .actor(Some(actor)),
        )
        .await?;
    }
    Ok(())
}
