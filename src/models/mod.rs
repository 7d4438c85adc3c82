//! Data models

mod category;
mod dashboard;
mod geo;
mod history;
mod notification;
mod rbac;
mod report;
mod status;
mod user;

pub use category::*;
pub use dashboard::*;
pub use geo::*;
pub use history::*;
pub use notification::*;
pub use rbac::*;
pub use report::*;
pub use status::*;
pub use user::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Deactivation of a catalog entry whose dependents must be moved elsewhere
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DeactivateRequest {
    /// Where dependents go; each cascade has its own fallback when absent
    pub replacement_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// Outcome of a cascading deactivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeSummary {
    pub entity_id: Uuid,
    /// Number of dependents that were moved
    pub affected: u64,
    pub replacement_id: Option<Uuid>,
}
