//! Dashboard aggregates and the report map

use chrono::{Duration, NaiveTime, Utc};
use serde_json::json;
use sqlx::SqlitePool;

use crate::db::{HistoryRepository, ReportFilter, ReportRepository};
use crate::models::{
    BoundingBox, DashboardQuery, DashboardSummary, FeatureCollection, HistoryQuery, MapFeature,
    MapQuery, PointGeometry, Report,
};
use crate::utils::{AppError, AppResult};

const DEFAULT_WINDOW_DAYS: u32 = 30;
const MAX_WINDOW_DAYS: u32 = 365;
const RECENT_ACTIVITY: u32 = 20;
const MAX_MAP_FEATURES: u32 = 5000;

pub struct DashboardService {
    pool: SqlitePool,
}

impl DashboardService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn summary(&self, query: &DashboardQuery) -> AppResult<DashboardSummary> {
        let days = window_days(query.days);
        let since = (Utc::now().date_naive() - Duration::days(i64::from(days) - 1))
            .and_time(NaiveTime::MIN)
            .and_utc();
        let reports = ReportRepository::new(&self.pool);

        let recent_activity = HistoryRepository::new(&self.pool)
            .list(&HistoryQuery {
                limit: Some(RECENT_ACTIVITY),
                ..Default::default()
            })
            .await?;

        Ok(DashboardSummary {
            totals: reports.totals().await?,
            by_status: reports.count_by_status().await?,
            by_category: reports.count_by_category().await?,
            by_priority: reports.count_by_priority().await?,
            by_assignee: reports.open_by_assignee().await?,
            avg_resolution_hours: reports.avg_resolution_hours().await?,
            created_per_day: reports.created_per_day(since).await?,
            recent_activity,
        })
    }

    /// Reports as GeoJSON points
    pub async fn map(&self, query: &MapQuery) -> AppResult<FeatureCollection> {
        let bbox = query
            .bbox
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .map(str::parse::<BoundingBox>)
            .transpose()
            .map_err(AppError::BadRequest)?;

        let filter = ReportFilter::from_map_query(query, bbox);
        let reports = ReportRepository::new(&self.pool)
            .list_for_map(&filter, MAX_MAP_FEATURES)
            .await?;

        Ok(FeatureCollection::new(reports.into_iter().map(to_feature).collect()))
    }
}

fn window_days(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, MAX_WINDOW_DAYS)
}

fn to_feature(report: Report) -> MapFeature {
    MapFeature {
        kind: "Feature".to_string(),
        id: report.id,
        geometry: PointGeometry {
            kind: "Point".to_string(),
            coordinates: [report.longitude, report.latitude],
        },
        properties: json!({
            "folio": report.folio,
            "title": report.title,
            "status": report.status_code,
            "status_name": report.status_name,
            "color": report.status_color,
            "priority": report.priority,
            "category": report.category_name,
            "is_closed": report.is_closed,
            "created_at": report.created_at,
        }),
    }
}
