//! Civic Reports Library
//!
//! Citizen report tracking for municipal operators: reports move through
//! configurable statuses, are filed under categories, get assigned to staff
//! and keep an append-only change history.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, AuthUser, Claims};

use services::{
    CatalogService, DashboardService, GeocodingService, NotificationService, ReportService,
    UserService,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Notification store and live event channel
    pub notifications: NotificationService,
    /// Nominatim client, shared so its cache is too
    pub geocoder: Arc<GeocodingService>,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> anyhow::Result<Self> {
        let geocoder = Arc::new(GeocodingService::new(config.geocoding.clone())?);
        let notifications = NotificationService::new(db.clone());
        Ok(Self {
            config,
            db,
            notifications,
            geocoder,
        })
    }

    pub fn reports(&self) -> ReportService {
        ReportService::new(
            self.db.clone(),
            self.config.reports.clone(),
            self.notifications.clone(),
        )
    }

    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.db.clone(), self.notifications.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.db.clone(), &self.config.auth, &self.config.rbac)
    }

    pub fn dashboard(&self) -> DashboardService {
        DashboardService::new(self.db.clone())
    }
}
