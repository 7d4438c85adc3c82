//! Business logic services

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod dashboard;
pub mod geocoding;
pub mod notification;
pub mod reports;
pub mod users;

pub use auth::{AuthService, Principal};
pub use cache::{Cache, CacheEntry};
pub use catalog::CatalogService;
pub use dashboard::DashboardService;
pub use geocoding::GeocodingService;
pub use notification::{NotificationEvent, NotificationService};
pub use reports::{resolved_at_after, ReportService};
pub use users::UserService;
