//! Test fixtures
//!
//! Ids of the catalog rows created by the seed migration and ready-made
//! request bodies.

use serde_json::{json, Value};
use uuid::Uuid;

pub const STATUS_PENDING: Uuid = Uuid::from_u128(0x101);
pub const STATUS_IN_REVIEW: Uuid = Uuid::from_u128(0x102);
pub const STATUS_IN_PROGRESS: Uuid = Uuid::from_u128(0x103);
pub const STATUS_RESOLVED: Uuid = Uuid::from_u128(0x104);
pub const STATUS_REJECTED: Uuid = Uuid::from_u128(0x105);

pub const CATEGORY_POTHOLES: Uuid = Uuid::from_u128(0x201);
pub const CATEGORY_LIGHTING: Uuid = Uuid::from_u128(0x202);
pub const CATEGORY_WASTE: Uuid = Uuid::from_u128(0x203);
pub const CATEGORY_WATER: Uuid = Uuid::from_u128(0x204);
pub const CATEGORY_GREEN_AREAS: Uuid = Uuid::from_u128(0x205);

/// Seed status id for a status code
pub fn status_id(code: &str) -> Uuid {
    match code {
        "pending" => STATUS_PENDING,
        "in_review" => STATUS_IN_REVIEW,
        "in_progress" => STATUS_IN_PROGRESS,
        "resolved" => STATUS_RESOLVED,
        "rejected" => STATUS_REJECTED,
        other => panic!("Unknown seed status: {}", other),
    }
}

/// Seed category id for a category name
pub fn category_id(name: &str) -> Uuid {
    match name {
        "Potholes" => CATEGORY_POTHOLES,
        "Street lighting" => CATEGORY_LIGHTING,
        "Waste collection" => CATEGORY_WASTE,
        "Water leaks" => CATEGORY_WATER,
        "Green areas" => CATEGORY_GREEN_AREAS,
        other => panic!("Unknown seed category: {}", other),
    }
}

/// Minimal valid report body
pub fn report_payload(title: &str, category_id: Uuid) -> Value {
    json!({
        "title": title,
        "description": format!("{} reported by a neighbour", title),
        "category_id": category_id,
        "latitude": 19.4326,
        "longitude": -99.1332,
    })
}

/// Report body located at a given point
pub fn report_at(title: &str, category_id: Uuid, latitude: f64, longitude: f64) -> Value {
    let mut body = report_payload(title, category_id);
    body["latitude"] = json!(latitude);
    body["longitude"] = json!(longitude);
    body
}

pub fn category_payload(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("{} issues", name),
        "color": "#123ABC",
    })
}

pub fn status_payload(code: &str, name: &str, is_final: bool) -> Value {
    json!({
        "code": code,
        "name": name,
        "color": "#0EA5E9",
        "sort_order": 35,
        "is_final": is_final,
    })
}

pub fn role_payload(name: &str, permissions: &[&str]) -> Value {
    json!({
        "name": name,
        "display_name": name.replace('_', " "),
        "permissions": permissions,
    })
}
