//! Role-Based Access Control (RBAC) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::validate_identifier;

/// A role (Rol) that can be assigned to users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Unique identifier
    pub id: Uuid,

    /// Role name (e.g., "admin", "operator", "viewer")
    pub name: String,

    /// Human-readable display name
    pub display_name: String,

    /// Description of the role
    pub description: Option<String>,

    /// Permissions granted by this role
    #[serde(default)]
    pub permissions: Vec<Permission>,

    /// Whether this is a built-in system role
    pub is_system: bool,

    /// Inactive roles cannot be assigned
    pub active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Whether any permission of this role grants `action` on `resource`
    pub fn allows(&self, resource: Resource, action: Action) -> bool {
        self.permissions.iter().any(|p| p.grants(resource, action))
    }
}

/// A permission granted to a role, serialized as `"resource:action"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    /// `admin` on a resource implies every action on it
    pub fn grants(&self, resource: Resource, action: Action) -> bool {
        self.resource == resource && (self.action == action || self.action == Action::Admin)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource.as_str(), self.action.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, action) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid permission '{}', expected resource:action", s))?;
        Ok(Self {
            resource: resource.parse()?,
            action: action.parse()?,
        })
    }
}

impl TryFrom<String> for Permission {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.to_string()
    }
}

/// Resources that can be protected by RBAC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Citizen reports
    Reports,
    /// Report categories
    Categories,
    /// Report statuses
    Statuses,
    /// User accounts
    Users,
    /// RBAC roles
    Roles,
    /// Change history
    History,
    /// Dashboard and map aggregates
    Dashboard,
    /// User notifications
    Notifications,
}

impl Resource {
    /// Get all available resources
    pub fn all() -> Vec<Resource> {
        vec![
            Resource::Reports,
            Resource::Categories,
            Resource::Statuses,
            Resource::Users,
            Resource::Roles,
            Resource::History,
            Resource::Dashboard,
            Resource::Notifications,
        ]
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Reports => "reports",
            Resource::Categories => "categories",
            Resource::Statuses => "statuses",
            Resource::Users => "users",
            Resource::Roles => "roles",
            Resource::History => "history",
            Resource::Dashboard => "dashboard",
            Resource::Notifications => "notifications",
        }
    }
}

impl std::str::FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::all()
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("Unknown resource: {}", s))
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read/view resource
    Read,
    /// Create new resource
    Create,
    /// Update existing resource
    Update,
    /// Delete resource
    Delete,
    /// Assign reports to users
    Assign,
    /// Full access
    Admin,
}

impl Action {
    /// Get all available actions
    pub fn all() -> Vec<Action> {
        vec![
            Action::Read,
            Action::Create,
            Action::Update,
            Action::Delete,
            Action::Assign,
            Action::Admin,
        ]
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Assign => "assign",
            Action::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::all()
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

/// Built-in system roles seeded by the initial migrations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemRole {
    Admin,
    Operator,
    Viewer,
}

impl SystemRole {
    pub fn all() -> [SystemRole; 3] {
        [SystemRole::Admin, SystemRole::Operator, SystemRole::Viewer]
    }

    /// Get the role name
    pub fn name(&self) -> &'static str {
        match self {
            SystemRole::Admin => "admin",
            SystemRole::Operator => "operator",
            SystemRole::Viewer => "viewer",
        }
    }

    /// Fixed UUID used by the seed migration
    pub fn uuid(&self) -> Uuid {
        let id = match self {
            SystemRole::Admin => 1u128,
            SystemRole::Operator => 2,
            SystemRole::Viewer => 3,
        };
        Uuid::from_u128(id)
    }
}

/// Request to create a new role
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 2, max = 50), custom(function = "validate_identifier"))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Request to update a role
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 2, max = 50), custom(function = "validate_identifier"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub permissions: Option<Vec<Permission>>,
}
