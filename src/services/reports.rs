//! Report workflow
//!
//! Every mutation runs in a transaction that also appends the matching
//! history entries. Notifications are sent only after the commit.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::config::ReportsConfig;
use crate::db::{self, HistoryRepository, NewReport, ReportFilter, ReportRepository};
use crate::models::{
    AssignReportRequest, Category, ChangeCategoryRequest, ChangePriorityRequest,
    ChangeStatusRequest, CreateReportRequest, EntityType, HistoryAction, HistoryEntry,
    NewHistoryEntry, NewNotification, NotificationKind, Report, ReportPage, ReportQuery,
    ReportStatus, UpdateReportRequest,
};
use crate::services::notification::NotificationService;
use crate::utils::{AppError, AppResult};

pub struct ReportService {
    pool: SqlitePool,
    settings: ReportsConfig,
    notifications: NotificationService,
}

impl ReportService {
    pub fn new(pool: SqlitePool, settings: ReportsConfig, notifications: NotificationService) -> Self {
        Self {
            pool,
            settings,
            notifications,
        }
    }

    pub async fn get_report(&self, id: Uuid) -> AppResult<Report> {
        ReportRepository::new(&self.pool)
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Report {} not found", id)))
    }

    pub async fn list_reports(&self, query: &ReportQuery) -> AppResult<ReportPage> {
        let assignee = query.assignee_filter().map_err(AppError::BadRequest)?;
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppError::bad_request("'from' must not be after 'to'"));
            }
        }

        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(self.settings.default_page_size)
            .clamp(1, self.settings.max_page_size);

        let filter = ReportFilter::from_query(query, assignee);
        let (items, total) = ReportRepository::new(&self.pool)
            .list(&filter, query.sort, query.order, page, page_size)
            .await?;

        Ok(ReportPage {
            items,
            total,
            page,
            page_size,
        })
    }

    pub async fn create_report(&self, req: CreateReportRequest, actor: Option<Uuid>) -> AppResult<Report> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;

        let category = active_category(&mut tx, req.category_id).await?;
        let initial = db::status_repository::find_initial(&mut *tx)
            .await?
            .ok_or_else(|| AppError::conflict("No active initial status is configured"))?;

        let id = ReportRepository::insert(
            &mut tx,
            &NewReport {
                request: &req,
                status_id: initial.id,
                priority: req.priority.unwrap_or(self.settings.default_priority),
                created_by: actor,
                folio_prefix: &self.settings.folio_prefix,
            },
        )
        .await?;

        let report = load_report(&mut tx, id).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::report(id, HistoryAction::Created)
                .change("status", None::<String>, Some(initial.code.as_str()))
                .actor(actor),
        )
        .await?;

        tx.commit().await?;

        info!(
            report_id = %id,
            folio = %report.folio,
            category = %category.name,
            "Report created"
        );
        Ok(report)
    }

    /// Partial update of descriptive fields, one history entry per changed field
    pub async fn update_report(&self, id: Uuid, req: UpdateReportRequest, actor: Uuid) -> AppResult<Report> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut report = load_report(&mut tx, id).await?;

        let mut changes: Vec<(&'static str, Option<String>, Option<String>)> = Vec::new();

        if let Some(title) = req.title.map(|t| t.trim().to_string()) {
            if title != report.title {
                changes.push(("title", Some(report.title.clone()), Some(title.clone())));
                report.title = title;
            }
        }
        if let Some(description) = req.description.map(|d| d.trim().to_string()) {
            if description != report.description {
                changes.push((
                    "description",
                    Some(report.description.clone()),
                    Some(description.clone()),
                ));
                report.description = description;
            }
        }
        if let Some(latitude) = req.latitude {
            if latitude != report.latitude {
                changes.push((
                    "latitude",
                    Some(report.latitude.to_string()),
                    Some(latitude.to_string()),
                ));
                report.latitude = latitude;
            }
        }
        if let Some(longitude) = req.longitude {
            if longitude != report.longitude {
                changes.push((
                    "longitude",
                    Some(report.longitude.to_string()),
                    Some(longitude.to_string()),
                ));
                report.longitude = longitude;
            }
        }
        diff_optional(&mut changes, "address", &mut report.address, req.address);
        diff_optional(&mut changes, "reporter_name", &mut report.reporter_name, req.reporter_name);
        diff_optional(&mut changes, "reporter_email", &mut report.reporter_email, req.reporter_email);
        diff_optional(&mut changes, "reporter_phone", &mut report.reporter_phone, req.reporter_phone);

        if changes.is_empty() {
            debug!(report_id = %id, "Report update without changes");
            return Ok(report);
        }

        ReportRepository::update_details(&mut tx, &report).await?;
        for (field, old, new) in &changes {
            HistoryRepository::record(
                &mut *tx,
                &NewHistoryEntry::report(id, HistoryAction::Updated)
                    .change(field, old.clone(), new.clone())
                    .actor(Some(actor)),
            )
            .await?;
        }
        let report = load_report(&mut tx, id).await?;
        tx.commit().await?;

        info!(report_id = %id, fields = changes.len(), actor = %actor, "Report updated");
        Ok(report)
    }

    /// Move a report to another status.
    ///
    /// Returns the report unchanged when it is already in the target status.
    pub async fn update_status(&self, id: Uuid, req: ChangeStatusRequest, actor: Uuid) -> AppResult<Report> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let report = load_report(&mut tx, id).await?;

        let target = db::status_repository::find_by_id(&mut *tx, req.status_id)
            .await?
            .ok_or_else(|| AppError::bad_request(format!("Status {} not found", req.status_id)))?;
        if !target.active {
            return Err(AppError::bad_request(format!(
                "Status '{}' is inactive",
                target.code
            )));
        }

        if report.status_id == target.id {
            debug!(report_id = %id, status = %target.code, "Status unchanged");
            return Ok(report);
        }

        let notice = apply_status_change(&mut tx, &report, &target, Some(actor), req.comment).await?;
        let updated = load_report(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            report_id = %id,
            from = %report.status_code,
            status = %target.code,
            actor = %actor,
            "Report status changed"
        );

        if let Some(notice) = notice.filter(|n| n.user_id != actor.to_string()) {
            self.notifications.notify_all(vec![notice]).await;
        }

        Ok(updated)
    }

    /// Assign to a user, or unassign with `user_id: None`
    pub async fn assign_report(&self, id: Uuid, req: AssignReportRequest, actor: Uuid) -> AppResult<Report> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let report = load_report(&mut tx, id).await?;

        if report.assigned_to == req.user_id {
            debug!(report_id = %id, "Assignment unchanged");
            return Ok(report);
        }

        let assignee = match req.user_id {
            Some(user_id) => {
                let user = db::user_repository::find_by_id(&mut *tx, user_id)
                    .await?
                    .ok_or_else(|| AppError::bad_request(format!("User {} not found", user_id)))?;
                if !user.active {
                    return Err(AppError::bad_request(format!(
                        "User '{}' is inactive and cannot be assigned",
                        user.username
                    )));
                }
                Some(user)
            }
            None => None,
        };

        ReportRepository::set_assignee(&mut tx, id, req.user_id).await?;

        let entry = match assignee {
            Some(ref user) => NewHistoryEntry::report(id, HistoryAction::Assigned).change(
                "assigned_to",
                report.assignee_username.clone(),
                Some(user.username.as_str()),
            ),
            None => NewHistoryEntry::report(id, HistoryAction::Unassigned).change(
                "assigned_to",
                report.assignee_username.clone(),
                None::<String>,
            ),
        };
        HistoryRepository::record(&mut *tx, &entry.comment(req.comment).actor(Some(actor))).await?;

        let updated = load_report(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            report_id = %id,
            assignee = ?updated.assignee_username,
            actor = %actor,
            "Report assignment changed"
        );

        if let Some(user) = assignee.filter(|u| u.id != actor) {
            self.notifications
                .notify_all(vec![NewNotification {
                    user_id: user.id.to_string(),
                    title: "Report assigned".to_string(),
                    message: format!("{} \"{}\" was assigned to you", updated.folio, updated.title),
                    kind: NotificationKind::Info,
                    link: Some(report_link(id)),
                }])
                .await;
        }

        Ok(updated)
    }

    pub async fn update_priority(&self, id: Uuid, req: ChangePriorityRequest, actor: Uuid) -> AppResult<Report> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let report = load_report(&mut tx, id).await?;

        if report.priority == req.priority {
            debug!(report_id = %id, "Priority unchanged");
            return Ok(report);
        }

        ReportRepository::set_priority(&mut tx, id, req.priority).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::report(id, HistoryAction::PriorityChanged)
                .change("priority", Some(report.priority.as_str()), Some(req.priority.as_str()))
                .comment(req.comment)
                .actor(Some(actor)),
        )
        .await?;
        let updated = load_report(&mut tx, id).await?;
        tx.commit().await?;

        info!(report_id = %id, priority = %req.priority, actor = %actor, "Report priority changed");
        Ok(updated)
    }

    pub async fn change_category(&self, id: Uuid, req: ChangeCategoryRequest, actor: Uuid) -> AppResult<Report> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let report = load_report(&mut tx, id).await?;

        if report.category_id == req.category_id {
            debug!(report_id = %id, "Category unchanged");
            return Ok(report);
        }

        let target = active_category(&mut tx, req.category_id).await?;
        apply_category_change(&mut tx, &report, &target, Some(actor), req.comment).await?;
        let updated = load_report(&mut tx, id).await?;
        tx.commit().await?;

        info!(report_id = %id, category = %target.name, actor = %actor, "Report category changed");
        Ok(updated)
    }

    /// Remove a report. Its history stays, closed by a `deleted` entry.
    pub async fn delete_report(&self, id: Uuid, actor: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let report = load_report(&mut tx, id).await?;

        ReportRepository::delete(&mut tx, id).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::report(id, HistoryAction::Deleted)
                .change("folio", Some(report.folio.as_str()), None::<String>)
                .actor(Some(actor)),
        )
        .await?;
        tx.commit().await?;

        info!(report_id = %id, folio = %report.folio, actor = %actor, "Report deleted");
        Ok(())
    }

    /// History of a report, newest first. Available for deleted reports too.
    pub async fn report_history(&self, id: Uuid) -> AppResult<Vec<HistoryEntry>> {
        Ok(HistoryRepository::new(&self.pool)
            .for_entity(EntityType::Report, id)
            .await?)
    }
}

pub(crate) fn report_link(id: Uuid) -> String {
    format!("/admin/reportes/{}", id)
}

/// `resolved_at` after a status change: kept while moving between final
/// statuses, stamped when a report is closed, cleared when it is reopened.
pub fn resolved_at_after(
    current: Option<DateTime<Utc>>,
    was_final: bool,
    target_final: bool,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (target_final, was_final, current) {
        (false, _, _) => None,
        (true, true, Some(ts)) => Some(ts),
        (true, _, _) => Some(now),
    }
}

pub(crate) async fn load_report(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Report> {
    db::report_repository::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Report {} not found", id)))
}

async fn active_category(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Category> {
    let category = db::category_repository::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::bad_request(format!("Category {} not found", id)))?;
    if !category.active {
        return Err(AppError::bad_request(format!(
            "Category '{}' is inactive",
            category.name
        )));
    }
    Ok(category)
}

/// Move `report` to `target`, record `status_changed` and return the
/// notification owed to the assignee, if any.
pub(crate) async fn apply_status_change(
    conn: &mut SqliteConnection,
    report: &Report,
    target: &ReportStatus,
    actor: Option<Uuid>,
    comment: Option<String>,
) -> AppResult<Option<NewNotification>> {
    let resolved_at = resolved_at_after(report.resolved_at, report.is_closed, target.is_final, Utc::now());

    ReportRepository::set_status(conn, report.id, target.id, resolved_at).await?;
    HistoryRepository::record(
        &mut *conn,
        &NewHistoryEntry::report(report.id, HistoryAction::StatusChanged)
            .change("status", Some(report.status_code.as_str()), Some(target.code.as_str()))
            .comment(comment)
            .actor(actor),
    )
    .await?;

    Ok(report.assigned_to.map(|assignee| NewNotification {
        user_id: assignee.to_string(),
        title: "Report status changed".to_string(),
        message: format!(
            "{} moved from {} to {}",
            report.folio, report.status_name, target.name
        ),
        kind: if target.is_final {
            NotificationKind::Success
        } else {
            NotificationKind::Info
        },
        link: Some(report_link(report.id)),
    }))
}

pub(crate) async fn apply_category_change(
    conn: &mut SqliteConnection,
    report: &Report,
    target: &Category,
    actor: Option<Uuid>,
    comment: Option<String>,
) -> AppResult<()> {
    ReportRepository::set_category(conn, report.id, target.id).await?;
    HistoryRepository::record(
        &mut *conn,
        &NewHistoryEntry::report(report.id, HistoryAction::CategoryChanged)
            .change("category", Some(report.category_name.as_str()), Some(target.name.as_str()))
            .comment(comment)
            .actor(actor),
    )
    .await?;
    Ok(())
}

/// Unassign `report`, recording `unassigned`
pub(crate) async fn apply_unassign(
    conn: &mut SqliteConnection,
    report: &Report,
    actor: Option<Uuid>,
    comment: Option<String>,
) -> AppResult<()> {
    ReportRepository::set_assignee(conn, report.id, None).await?;
    HistoryRepository::record(
        &mut *conn,
        &NewHistoryEntry::report(report.id, HistoryAction::Unassigned)
            .change("assigned_to", report.assignee_username.clone(), None::<String>)
            .comment(comment)
            .actor(actor),
    )
    .await?;
    Ok(())
}

fn diff_optional(
    changes: &mut Vec<(&'static str, Option<String>, Option<String>)>,
    field: &'static str,
    current: &mut Option<String>,
    requested: Option<String>,
) {
    let Some(value) = requested.map(|v| v.trim().to_string()) else {
        return;
    };
    // An empty string clears the field
    let value = (!value.is_empty()).then_some(value);
    if *current != value {
        changes.push((field, current.clone(), value.clone()));
        *current = value;
    }
}
