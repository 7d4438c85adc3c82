//! Change history (Historial) models
//!
//! History entries are append-only: they are written alongside every state
//! change and never modified afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of entity a history entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Report,
    User,
    Role,
    Category,
    Status,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Report => "report",
            EntityType::User => "user",
            EntityType::Role => "role",
            EntityType::Category => "category",
            EntityType::Status => "status",
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "report" => Ok(EntityType::Report),
            "user" => Ok(EntityType::User),
            "role" => Ok(EntityType::Role),
            "category" => Ok(EntityType::Category),
            "status" => Ok(EntityType::Status),
            _ => Err(format!("Invalid entity type: {}", s)),
        }
    }
}

/// What happened to the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Updated,
    StatusChanged,
    Assigned,
    Unassigned,
    PriorityChanged,
    CategoryChanged,
    RoleChanged,
    Deactivated,
    Activated,
    Deleted,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::Updated => "updated",
            HistoryAction::StatusChanged => "status_changed",
            HistoryAction::Assigned => "assigned",
            HistoryAction::Unassigned => "unassigned",
            HistoryAction::PriorityChanged => "priority_changed",
            HistoryAction::CategoryChanged => "category_changed",
            HistoryAction::RoleChanged => "role_changed",
            HistoryAction::Deactivated => "deactivated",
            HistoryAction::Activated => "activated",
            HistoryAction::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for HistoryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "created" => HistoryAction::Created,
            "updated" => HistoryAction::Updated,
            "status_changed" => HistoryAction::StatusChanged,
            "assigned" => HistoryAction::Assigned,
            "unassigned" => HistoryAction::Unassigned,
            "priority_changed" => HistoryAction::PriorityChanged,
            "category_changed" => HistoryAction::CategoryChanged,
            "role_changed" => HistoryAction::RoleChanged,
            "deactivated" => HistoryAction::Deactivated,
            "activated" => HistoryAction::Activated,
            "deleted" => HistoryAction::Deleted,
            _ => return Err(format!("Invalid history action: {}", s)),
        };
        Ok(action)
    }
}

/// A recorded change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: HistoryAction,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    /// `None` when the change was made by the system
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Builder for a history entry about to be recorded
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: HistoryAction,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub actor_id: Option<Uuid>,
}

impl NewHistoryEntry {
    pub fn new(entity_type: EntityType, entity_id: Uuid, action: HistoryAction) -> Self {
        Self {
            entity_type,
            entity_id,
            action,
            field: None,
            old_value: None,
            new_value: None,
            comment: None,
            actor_id: None,
        }
    }

    pub fn report(entity_id: Uuid, action: HistoryAction) -> Self {
        Self::new(EntityType::Report, entity_id, action)
    }

    pub fn user(entity_id: Uuid, action: HistoryAction) -> Self {
        Self::new(EntityType::User, entity_id, action)
    }

    /// Record a field transition
    pub fn change(
        mut self,
        field: &str,
        old_value: Option<impl Into<String>>,
        new_value: Option<impl Into<String>>,
    ) -> Self {
        self.field = Some(field.to_string());
        self.old_value = old_value.map(Into::into);
        self.new_value = new_value.map(Into::into);
        self
    }

    pub fn comment(mut self, comment: Option<impl Into<String>>) -> Self {
        self.comment = comment.map(Into::into);
        self
    }

    pub fn actor(mut self, actor_id: Option<Uuid>) -> Self {
        self.actor_id = actor_id;
        self
    }
}

/// Filters for listing history
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<HistoryAction>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
