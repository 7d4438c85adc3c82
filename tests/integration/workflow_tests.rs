//! Report workflow integration tests
//!
//! Status transitions, assignment, priority and category changes, and the
//! notifications they produce.

use rstest::rstest;
use serde_json::{json, Value};

use civic_reports::models::SystemRole;

use crate::common::*;

async fn file_report(app: &TestApp, user: &TestUser, title: &str) -> String {
    let report: Value = app
        .post_as(user, "/api/v1/reports", report_payload(title, CATEGORY_POTHOLES))
        .await
        .json();
    report["id"].as_str().unwrap().to_string()
}

async fn history_of(app: &TestApp, user: &TestUser, id: &str) -> Vec<Value> {
    app.get_as(user, &format!("/api/v1/reports/{}/history", id))
        .await
        .json()
}

async fn notifications_of(app: &TestApp, user: &TestUser) -> Vec<Value> {
    let body: Value = app.get_as(user, "/api/v1/notifications").await.json();
    serde_json::from_value(body["notifications"].clone()).unwrap()
}

#[tokio::test]
async fn test_status_change_records_transition() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;
    let id = file_report(&app, &operator, "Deep pothole").await;

    let response = app
        .put_as(
            &operator,
            &format!("/api/v1/reports/{}/status", id),
            json!({ "status_id": STATUS_IN_PROGRESS, "comment": "Crew dispatched" }),
        )
        .await;
    response.assert_ok();
    let report: Value = response.json();
    assert_eq!(report["status_code"], "in_progress");
    assert_eq!(report["is_closed"], false);

    let history = history_of(&app, &operator, &id).await;
    let change = history
        .iter()
        .find(|h| h["action"] == "status_changed")
        .unwrap();
    assert_eq!(change["field"], "status");
    assert_eq!(change["old_value"], "pending");
    assert_eq!(change["new_value"], "in_progress");
    assert_eq!(change["comment"], "Crew dispatched");
    assert_eq!(change["actor_id"], json!(operator.id));
}

#[tokio::test]
async fn test_resolving_sets_and_reopening_clears_resolved_at() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;
    let id = file_report(&app, &operator, "Deep pothole").await;
    let uri = format!("/api/v1/reports/{}/status", id);

    let resolved: Value = app
        .put_as(&operator, &uri, json!({ "status_id": STATUS_RESOLVED }))
        .await
        .json();
    assert_eq!(resolved["is_closed"], true);
    let resolved_at = resolved["resolved_at"].clone();
    assert!(resolved_at.is_string());

    // Moving between final statuses keeps the original timestamp
    let rejected: Value = app
        .put_as(&operator, &uri, json!({ "status_id": STATUS_REJECTED }))
        .await
        .json();
    assert_eq!(rejected["status_code"], "rejected");
    assert_eq!(rejected["resolved_at"], resolved_at);

    let reopened: Value = app
        .put_as(&operator, &uri, json!({ "status_id": STATUS_IN_REVIEW }))
        .await
        .json();
    assert_eq!(reopened["is_closed"], false);
    assert!(reopened["resolved_at"].is_null());
}

#[tokio::test]
async fn test_same_status_is_a_no_op() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;
    let id = file_report(&app, &operator, "Deep pothole").await;

    app.put_as(
        &operator,
        &format!("/api/v1/reports/{}/status", id),
        json!({ "status_id": STATUS_PENDING }),
    )
    .await
    .assert_ok();

    assert_eq!(history_of(&app, &operator, &id).await.len(), 1);
}

#[tokio::test]
async fn test_status_change_rejects_unknown_status() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;
    let id = file_report(&app, &operator, "Deep pothole").await;

    app.put_as(
        &operator,
        &format!("/api/v1/reports/{}/status", id),
        json!({ "status_id": uuid::Uuid::new_v4() }),
    )
    .await
    .assert_bad_request();

    app.put_as(
        &operator,
        &format!("/api/v1/reports/{}/status", uuid::Uuid::new_v4()),
        json!({ "status_id": STATUS_IN_REVIEW }),
    )
    .await
    .assert_not_found();
}

#[tokio::test]
async fn test_assignment_notifies_assignee() {
    let app = TestApp::new().await;
    let dispatcher = app.create_user("dispatcher", SystemRole::Operator).await;
    let crew = app.create_user("crew_lead", SystemRole::Operator).await;
    let id = file_report(&app, &dispatcher, "Deep pothole").await;

    let response = app
        .put_as(
            &dispatcher,
            &format!("/api/v1/reports/{}/assign", id),
            json!({ "user_id": crew.id, "comment": "Closest crew" }),
        )
        .await;
    response.assert_ok();
    let report: Value = response.json();
    assert_eq!(report["assigned_to"], json!(crew.id));
    assert_eq!(report["assignee_username"], "crew_lead");

    let notifications = notifications_of(&app, &crew).await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["title"], "Report assigned");
    assert_eq!(notifications[0]["link"], format!("/admin/reportes/{}", id));
    assert_eq!(notifications[0]["read"], false);

    // The dispatcher acted and is not notified
    assert!(notifications_of(&app, &dispatcher).await.is_empty());

    let history = history_of(&app, &dispatcher, &id).await;
    let assigned = history.iter().find(|h| h["action"] == "assigned").unwrap();
    assert!(assigned["old_value"].is_null());
    assert_eq!(assigned["new_value"], "crew_lead");
    assert_eq!(assigned["comment"], "Closest crew");
}

#[tokio::test]
async fn test_self_assignment_sends_no_notification() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;
    let id = file_report(&app, &operator, "Deep pothole").await;

    app.put_as(
        &operator,
        &format!("/api/v1/reports/{}/assign", id),
        json!({ "user_id": operator.id }),
    )
    .await
    .assert_ok();

    assert!(notifications_of(&app, &operator).await.is_empty());
}

#[tokio::test]
async fn test_status_change_notifies_assignee() {
    let app = TestApp::new().await;
    let dispatcher = app.create_user("dispatcher", SystemRole::Operator).await;
    let crew = app.create_user("crew_lead", SystemRole::Operator).await;
    let id = file_report(&app, &dispatcher, "Deep pothole").await;

    app.put_as(
        &dispatcher,
        &format!("/api/v1/reports/{}/assign", id),
        json!({ "user_id": crew.id }),
    )
    .await
    .assert_ok();
    app.put_as(
        &dispatcher,
        &format!("/api/v1/reports/{}/status", id),
        json!({ "status_id": STATUS_RESOLVED }),
    )
    .await
    .assert_ok();

    let notifications = notifications_of(&app, &crew).await;
    assert_eq!(notifications.len(), 2);
    let status_notice = notifications
        .iter()
        .find(|n| n["title"] == "Report status changed")
        .unwrap();
    assert_eq!(status_notice["kind"], "success");

    let stats: Value = app.get_as(&crew, "/api/v1/notifications/stats").await.json();
    assert_eq!(stats["stats"]["total"], 2);
    assert_eq!(stats["stats"]["unread"], 2);

    let marked: Value = app
        .post_as(&crew, "/api/v1/notifications/read-all", json!({}))
        .await
        .json();
    assert_eq!(marked["count"], 2);

    let stats: Value = app.get_as(&crew, "/api/v1/notifications/stats").await.json();
    assert_eq!(stats["stats"]["unread"], 0);
}

#[tokio::test]
async fn test_mark_single_notification_read() {
    let app = TestApp::new().await;
    let dispatcher = app.create_user("dispatcher", SystemRole::Operator).await;
    let crew = app.create_user("crew_lead", SystemRole::Operator).await;
    let id = file_report(&app, &dispatcher, "Deep pothole").await;

    app.put_as(
        &dispatcher,
        &format!("/api/v1/reports/{}/assign", id),
        json!({ "user_id": crew.id }),
    )
    .await
    .assert_ok();

    let notification_id = notifications_of(&app, &crew).await[0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Someone else's notification is invisible
    app.put_as(
        &dispatcher,
        &format!("/api/v1/notifications/{}/read", notification_id),
        json!({ "read": true }),
    )
    .await
    .assert_not_found();

    let response = app
        .put_as(
            &crew,
            &format!("/api/v1/notifications/{}/read", notification_id),
            json!({ "read": true }),
        )
        .await;
    response.assert_ok();
    let notification: Value = response.json();
    assert_eq!(notification["read"], true);
    assert!(notification["read_at"].is_string());
}

#[tokio::test]
async fn test_unassign_and_invalid_assignee() {
    let app = TestApp::new().await;
    let dispatcher = app.create_user("dispatcher", SystemRole::Operator).await;
    let crew = app.create_user("crew_lead", SystemRole::Operator).await;
    let id = file_report(&app, &dispatcher, "Deep pothole").await;
    let uri = format!("/api/v1/reports/{}/assign", id);

    app.put_as(&dispatcher, &uri, json!({ "user_id": uuid::Uuid::new_v4() }))
        .await
        .assert_bad_request();

    app.put_as(&dispatcher, &uri, json!({ "user_id": crew.id }))
        .await
        .assert_ok();
    let report: Value = app
        .put_as(&dispatcher, &uri, json!({ "user_id": null }))
        .await
        .json();
    assert!(report["assigned_to"].is_null());

    let history = history_of(&app, &dispatcher, &id).await;
    let unassigned = history.iter().find(|h| h["action"] == "unassigned").unwrap();
    assert_eq!(unassigned["old_value"], "crew_lead");
    assert!(unassigned["new_value"].is_null());
}

#[tokio::test]
async fn test_priority_and_category_changes() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;
    let id = file_report(&app, &operator, "Flooded street").await;

    let report: Value = app
        .put_as(
            &operator,
            &format!("/api/v1/reports/{}/priority", id),
            json!({ "priority": "critical" }),
        )
        .await
        .json();
    assert_eq!(report["priority"], "critical");

    let report: Value = app
        .put_as(
            &operator,
            &format!("/api/v1/reports/{}/category", id),
            json!({ "category_id": CATEGORY_WATER, "comment": "Misfiled" }),
        )
        .await
        .json();
    assert_eq!(report["category_name"], "Water leaks");

    let history = history_of(&app, &operator, &id).await;
    assert!(history.iter().any(|h| h["action"] == "priority_changed"
        && h["old_value"] == "medium"
        && h["new_value"] == "critical"));
    assert!(history.iter().any(|h| h["action"] == "category_changed"
        && h["old_value"] == "Potholes"
        && h["new_value"] == "Water leaks"));

    let page: Value = app
        .get_as(&operator, "/api/v1/reports?priority=critical")
        .await
        .json();
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn test_history_listing_filters() {
    let app = TestApp::new().await;
    let admin = app.create_admin("root").await;
    let viewer = app.create_user("viewer1", SystemRole::Viewer).await;
    let id = file_report(&app, &admin, "Deep pothole").await;

    app.put_as(
        &admin,
        &format!("/api/v1/reports/{}/status", id),
        json!({ "status_id": STATUS_IN_REVIEW }),
    )
    .await
    .assert_ok();

    let entries: Vec<Value> = app
        .get_as(
            &admin,
            &format!("/api/v1/history?entity_type=report&entity_id={}&action=status_changed", id),
        )
        .await
        .json();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["new_value"], "in_review");

    app.get_as(&viewer, "/api/v1/history").await.assert_forbidden();
}

#[tokio::test]
async fn test_change_user_role_records_history() {
    let app = TestApp::new().await;
    let admin = app.create_admin("root").await;
    let crew = app.create_user("crew_lead", SystemRole::Operator).await;
    let uri = format!("/api/v1/users/{}/role", crew.id);
    let history_uri = format!("/api/v1/users/{}/history", crew.id);

    let response = app
        .put_as(
            &admin,
            &uri,
            json!({ "role_id": SystemRole::Viewer.uuid(), "comment": "Desk duty" }),
        )
        .await;
    response.assert_ok();
    let user: Value = response.json();
    assert_eq!(user["role_name"], "viewer");

    let history: Vec<Value> = app.get_as(&admin, &history_uri).await.json();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["action"], "role_changed");
    assert_eq!(history[0]["old_value"], "operator");
    assert_eq!(history[0]["new_value"], "viewer");
    assert_eq!(history[0]["comment"], "Desk duty");
    assert_eq!(history[0]["actor_id"], json!(admin.id));

    // Same role again changes nothing
    app.put_as(&admin, &uri, json!({ "role_id": SystemRole::Viewer.uuid() }))
        .await
        .assert_ok();
    let history: Vec<Value> = app.get_as(&admin, &history_uri).await.json();
    assert_eq!(history.len(), 1);

    // The existing token carries the new role's rights
    app.post_as(&crew, "/api/v1/reports", report_payload("Pothole", CATEGORY_POTHOLES))
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_change_user_role_rejects_bad_targets() {
    let app = TestApp::new().await;
    let admin = app.create_admin("root").await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;
    let crew = app.create_user("crew_lead", SystemRole::Operator).await;
    let uri = format!("/api/v1/users/{}/role", crew.id);

    let role: Value = app
        .post_as(&admin, "/api/v1/roles", role_payload("seasonal", &["reports:read"]))
        .await
        .json();
    let role_id = role["id"].as_str().unwrap().to_string();
    app.post_as(&admin, &format!("/api/v1/roles/{}/deactivate", role_id), json!({}))
        .await
        .assert_ok();

    app.put_as(&admin, &uri, json!({ "role_id": role_id }))
        .await
        .assert_bad_request();
    app.put_as(&admin, &uri, json!({ "role_id": uuid::Uuid::new_v4() }))
        .await
        .assert_bad_request();
    app.put_as(
        &admin,
        &format!("/api/v1/users/{}/role", uuid::Uuid::new_v4()),
        json!({ "role_id": SystemRole::Viewer.uuid() }),
    )
    .await
    .assert_not_found();

    // Operators cannot hand out roles
    app.put_as(&operator, &uri, json!({ "role_id": SystemRole::Viewer.uuid() }))
        .await
        .assert_forbidden();

    let history: Vec<Value> = app
        .get_as(&admin, &format!("/api/v1/users/{}/history", crew.id))
        .await
        .json();
    assert!(history.is_empty());
}

#[rstest]
#[case::viewer_reads_reports(SystemRole::Viewer, "GET", "/api/v1/reports", 200)]
#[case::viewer_reads_dashboard(SystemRole::Viewer, "GET", "/api/v1/dashboard/summary", 200)]
#[case::viewer_cannot_list_users(SystemRole::Viewer, "GET", "/api/v1/users", 403)]
#[case::viewer_cannot_read_history(SystemRole::Viewer, "GET", "/api/v1/history", 403)]
#[case::operator_lists_users(SystemRole::Operator, "GET", "/api/v1/users", 200)]
#[case::operator_cannot_list_roles(SystemRole::Operator, "GET", "/api/v1/roles", 403)]
#[case::operator_cannot_create_category(SystemRole::Operator, "POST", "/api/v1/categories", 403)]
#[case::operator_cannot_create_status(SystemRole::Operator, "POST", "/api/v1/statuses", 403)]
#[case::admin_lists_roles(SystemRole::Admin, "GET", "/api/v1/roles", 200)]
#[case::admin_creates_category(SystemRole::Admin, "POST", "/api/v1/categories", 201)]
#[tokio::test]
async fn test_role_permissions(
    #[case] role: SystemRole,
    #[case] method: &str,
    #[case] uri: &str,
    #[case] expected: u16,
) {
    let app = TestApp::new().await;
    let user = app.create_user("someone", role).await;

    // Bodies are valid so the permission check decides the outcome
    let body = if uri.ends_with("/statuses") {
        status_payload("on_hold", "On hold", false)
    } else {
        category_payload("Sidewalks")
    };
    let response = match method {
        "GET" => app.get_as(&user, uri).await,
        _ => app.post_as(&user, uri, body).await,
    };

    assert_eq!(
        response.status.as_u16(),
        expected,
        "{} {} as {:?}: {}",
        method,
        uri,
        role,
        response.text()
    );
}
