//! Dashboard and map aggregates

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{HistoryEntry, Priority};

/// Counters shown at the top of the admin dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportTotals {
    pub total: i64,
    pub open: i64,
    pub closed: i64,
    pub unassigned_open: i64,
}

/// A group-by bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountBucket {
    pub id: Option<Uuid>,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityCount {
    pub priority: Priority,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCount {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub totals: ReportTotals,
    pub by_status: Vec<CountBucket>,
    pub by_category: Vec<CountBucket>,
    pub by_priority: Vec<PriorityCount>,
    /// Open reports per assignee
    pub by_assignee: Vec<CountBucket>,
    pub avg_resolution_hours: Option<f64>,
    pub created_per_day: Vec<DailyCount>,
    pub recent_activity: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    /// Window for `created_per_day`
    pub days: Option<u32>,
}

/// Filters for the report map
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapQuery {
    /// `min_lon,min_lat,max_lon,max_lat`
    pub bbox: Option<String>,
    pub status_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub open_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl std::str::FromStr for BoundingBox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| format!("Invalid bbox: {}", s))?;

        let [min_lon, min_lat, max_lon, max_lat] = parts[..] else {
            return Err("bbox must have four comma separated numbers".to_string());
        };

        if !(-180.0..=180.0).contains(&min_lon)
            || !(-180.0..=180.0).contains(&max_lon)
            || !(-90.0..=90.0).contains(&min_lat)
            || !(-90.0..=90.0).contains(&max_lat)
        {
            return Err("bbox coordinates out of range".to_string());
        }
        if min_lon > max_lon || min_lat > max_lat {
            return Err("bbox minimum exceeds maximum".to_string());
        }

        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }
}

/// GeoJSON point geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Uuid,
    pub geometry: PointGeometry,
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<MapFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<MapFeature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}
