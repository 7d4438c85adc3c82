//! Report status (EstadoReporte) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::{validate_hex_color, validate_identifier};

/// A state a report can hold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStatus {
    pub id: Uuid,
    /// Stable identifier, e.g. `in_progress`
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub sort_order: i64,
    /// New reports start in the single initial status
    pub is_initial: bool,
    /// Reports in a final status are closed
    pub is_final: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStatusRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_hex_color"))]
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_hex_color"))]
    pub color: Option<String>,
    pub sort_order: Option<i64>,
    pub is_initial: Option<bool>,
    pub is_final: Option<bool>,
}
