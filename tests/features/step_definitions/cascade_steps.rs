//! Deactivation step definitions

use cucumber::{then, when};
use serde_json::json;

use crate::common::{category_id, status_id};
use crate::features::TestWorld;

#[when(expr = "I deactivate the status {string}")]
async fn deactivate_status(world: &mut TestWorld, status: String) {
    let uri = format!("/api/v1/statuses/{}/deactivate", status_id(&status));
    let response = world.app().post_as(world.current(), &uri, json!({})).await;
    world.last_response = Some(response);
}

#[when(expr = "I deactivate the status {string} replacing it with {string}")]
async fn deactivate_status_with_replacement(world: &mut TestWorld, status: String, replacement: String) {
    let uri = format!("/api/v1/statuses/{}/deactivate", status_id(&status));
    let body = json!({ "replacement_id": status_id(&replacement) });
    let response = world.app().post_as(world.current(), &uri, body).await;
    world.last_response = Some(response);
}

#[when(expr = "I deactivate the category {string} replacing it with {string}")]
async fn deactivate_category(world: &mut TestWorld, category: String, replacement: String) {
    let uri = format!("/api/v1/categories/{}/deactivate", category_id(&category));
    let body = json!({ "replacement_id": category_id(&replacement) });
    let response = world.app().post_as(world.current(), &uri, body).await;
    world.last_response = Some(response);
}

#[when(expr = "I deactivate the user {string}")]
async fn deactivate_user(world: &mut TestWorld, username: String) {
    let uri = format!("/api/v1/users/{}/deactivate", world.user(&username).id);
    let response = world.app().post_as(world.current(), &uri, json!({})).await;
    world.last_response = Some(response);
}

#[then(expr = "{int} report(s) should have been affected")]
async fn reports_affected(world: &mut TestWorld, expected: u64) {
    let summary = world.last_json();
    assert_eq!(summary["affected"], expected, "Summary: {}", summary);
}

#[then(expr = "new reports should start in status {string}")]
async fn new_reports_start_in(world: &mut TestWorld, status: String) {
    let response = world
        .app()
        .post_as(
            world.current(),
            "/api/v1/reports",
            crate::common::report_payload("Probe report", category_id("Potholes")),
        )
        .await;
    response.assert_created();
    let report: serde_json::Value = response.json();
    assert_eq!(report["status_code"], status.as_str());
}
