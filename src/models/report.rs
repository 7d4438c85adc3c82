//! Citizen report (Reporte) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::{validate_description, validate_title};

/// Report priority, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn all() -> [Priority; 4] {
        [
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::Critical,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// Numeric rank used for sorting in SQL
    pub fn rank(&self) -> i64 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Critical => 4,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// A citizen-submitted incident with its current workflow state.
///
/// The `status_*`, `category_name` and `assignee_username` fields are joined
/// from the catalog tables when the report is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub number: i64,
    /// Human readable reference, e.g. `REP-000042`
    pub folio: String,
    pub title: String,
    pub description: String,

    pub category_id: Uuid,
    pub category_name: String,

    pub status_id: Uuid,
    pub status_code: String,
    pub status_name: String,
    pub status_color: String,
    /// True when the current status is final
    pub is_closed: bool,

    pub priority: Priority,

    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,

    pub reporter_name: Option<String>,
    pub reporter_email: Option<String>,
    pub reporter_phone: Option<String>,

    pub assigned_to: Option<Uuid>,
    pub assignee_username: Option<String>,
    pub created_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Request to file a new report
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReportRequest {
    #[validate(length(max = 200), custom(function = "validate_title"))]
    pub title: String,
    #[validate(length(max = 5000), custom(function = "validate_description"))]
    pub description: String,
    pub category_id: Uuid,
    pub priority: Option<Priority>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 120))]
    pub reporter_name: Option<String>,
    #[validate(email)]
    pub reporter_email: Option<String>,
    #[validate(length(max = 30))]
    pub reporter_phone: Option<String>,
}

/// Partial update of the descriptive fields of a report
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateReportRequest {
    #[validate(length(max = 200), custom(function = "validate_title"))]
    pub title: Option<String>,
    #[validate(length(max = 5000), custom(function = "validate_description"))]
    pub description: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 120))]
    pub reporter_name: Option<String>,
    #[validate(email)]
    pub reporter_email: Option<String>,
    #[validate(length(max = 30))]
    pub reporter_phone: Option<String>,
}

/// Move a report to another status
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangeStatusRequest {
    pub status_id: Uuid,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// Assign a report to a user, or unassign it with `user_id: null`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignReportRequest {
    pub user_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePriorityRequest {
    pub priority: Priority,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangeCategoryRequest {
    pub category_id: Uuid,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// Sort key for report listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Priority,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters and paging for report listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub status_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub priority: Option<Priority>,
    /// A user id, or `unassigned`
    pub assigned_to: Option<String>,
    /// `true` for open reports only, `false` for closed only
    pub open: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Free text over folio, title, description and address
    pub q: Option<String>,
    #[serde(default)]
    pub sort: ReportSort,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Assignee filter resolved from `ReportQuery::assigned_to`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeFilter {
    User(Uuid),
    Unassigned,
}

impl ReportQuery {
    pub fn assignee_filter(&self) -> Result<Option<AssigneeFilter>, String> {
        match self.assigned_to.as_deref() {
            None | Some("") => Ok(None),
            Some("unassigned") => Ok(Some(AssigneeFilter::Unassigned)),
            Some(other) => Uuid::parse_str(other)
                .map(|id| Some(AssigneeFilter::User(id)))
                .map_err(|_| format!("Invalid assigned_to filter: {}", other)),
        }
    }
}

/// One page of reports
#[derive(Debug, Clone, Serialize)]
pub struct ReportPage {
    pub items: Vec<Report>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}
