//! API integration tests
//!
//! Health, authentication and report CRUD through the full router.

use axum::http::StatusCode;
use serde_json::{json, Value};

use civic_reports::models::SystemRole;

use crate::common::*;

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health").await;

    response.assert_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_detailed_health_reports_components() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health/detailed").await;

    response.assert_ok();

    let json: Value = response.json();
    assert_eq!(json["components"]["database"]["status"], "healthy");
    assert_eq!(json["components"]["geocoding"]["status"], "disabled");
}

#[tokio::test]
async fn test_liveness_and_readiness_probes() {
    let app = TestApp::new().await;
    app.get("/api/v1/health/live").await.assert_ok();
    app.get("/api/v1/health/ready").await.assert_ok();
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;

    let response = app.get("/api/v1/reports").await;
    response.assert_unauthorized();

    let response = app
        .request(
            axum::http::Request::builder()
                .uri("/api/v1/reports")
                .header("Authorization", "Bearer not-a-jwt")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    response.assert_unauthorized();
}

#[tokio::test]
async fn test_login_with_created_user() {
    let app = TestApp::new().await;
    let admin = app.create_admin("root").await;

    app.post_as(
        &admin,
        "/api/v1/users",
        json!({
            "username": "maria.lopez",
            "email": "maria@example.com",
            "full_name": "Maria Lopez",
            "password": "correct-horse-battery",
            "role_id": SystemRole::Operator.uuid(),
        }),
    )
    .await
    .assert_ok();

    let response = app
        .post_json(
            "/api/v1/auth/login",
            json!({ "username": "maria.lopez", "password": "correct-horse-battery" }),
        )
        .await;
    response.assert_ok();

    let body: Value = response.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["role_name"], "operator");
    assert!(body["user"].get("password_hash").is_none());

    let token = body["access_token"].as_str().unwrap().to_string();
    let me = TestUser {
        id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
        username: "maria.lopez".to_string(),
        token,
    };
    let response = app.get_as(&me, "/api/v1/auth/me").await;
    response.assert_ok();
    let body: Value = response.json();
    let permissions: Vec<String> = serde_json::from_value(body["permissions"].clone()).unwrap();
    assert!(permissions.contains(&"reports:assign".to_string()));
    assert!(!permissions.iter().any(|p| p.starts_with("roles:")));
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let app = TestApp::new().await;
    let admin = app.create_admin("root").await;

    app.post_as(
        &admin,
        "/api/v1/users",
        json!({
            "username": "juan",
            "email": "juan@example.com",
            "full_name": "Juan Perez",
            "password": "correct-horse-battery",
        }),
    )
    .await
    .assert_ok();

    let response = app
        .post_json(
            "/api/v1/auth/login",
            json!({ "username": "juan", "password": "wrong-password" }),
        )
        .await;
    response.assert_unauthorized();

    let response = app
        .post_json(
            "/api/v1/auth/login",
            json!({ "username": "nobody", "password": "correct-horse-battery" }),
        )
        .await;
    response.assert_unauthorized();
}

#[tokio::test]
async fn test_create_report_starts_in_initial_status() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    let response = app
        .post_as(
            &operator,
            "/api/v1/reports",
            report_payload("Broken street light", CATEGORY_LIGHTING),
        )
        .await;
    response.assert_created();

    let report: Value = response.json();
    assert_eq!(report["number"], 1);
    assert_eq!(report["folio"], "REP-000001");
    assert_eq!(report["status_code"], "pending");
    assert_eq!(report["category_name"], "Street lighting");
    assert_eq!(report["priority"], "medium");
    assert_eq!(report["is_closed"], false);
    assert_eq!(report["created_by"], json!(operator.id));
    assert!(report["resolved_at"].is_null());

    let second: Value = app
        .post_as(
            &operator,
            "/api/v1/reports",
            report_payload("Pothole on 5th street", CATEGORY_POTHOLES),
        )
        .await
        .json();
    assert_eq!(second["folio"], "REP-000002");
}

#[tokio::test]
async fn test_create_report_records_history() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    let report: Value = app
        .post_as(
            &operator,
            "/api/v1/reports",
            report_payload("Overflowing bins", CATEGORY_WASTE),
        )
        .await
        .json();

    let response = app
        .get_as(&operator, &format!("/api/v1/reports/{}/history", report["id"].as_str().unwrap()))
        .await;
    response.assert_ok();

    let history: Vec<Value> = response.json();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["action"], "created");
    assert_eq!(history[0]["new_value"], "pending");
    assert_eq!(history[0]["actor_id"], json!(operator.id));
}

#[tokio::test]
async fn test_create_report_validation() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    let response = app
        .post_as(&operator, "/api/v1/reports", report_payload("No", CATEGORY_WASTE))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.error_type(), "validation_error");

    let response = app
        .post_as(
            &operator,
            "/api/v1/reports",
            report_at("Sinkhole", CATEGORY_POTHOLES, 91.0, 0.0),
        )
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .post_as(
            &operator,
            "/api/v1/reports",
            report_payload("Unknown category", uuid::Uuid::new_v4()),
        )
        .await;
    response.assert_bad_request();
}

#[tokio::test]
async fn test_blank_report_text_is_rejected() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    let mut body = report_payload("Pothole", CATEGORY_POTHOLES);
    body["title"] = json!("      ");
    let response = app.post_as(&operator, "/api/v1/reports", body).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = response.json();
    assert!(error["details"]["title"].is_array());

    let mut body = report_payload("Pothole", CATEGORY_POTHOLES);
    body["description"] = json!(" \n ");
    let response = app.post_as(&operator, "/api/v1/reports", body).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let report: Value = app
        .post_as(&operator, "/api/v1/reports", report_payload("Pothole", CATEGORY_POTHOLES))
        .await
        .json();
    let uri = format!("/api/v1/reports/{}", report["id"].as_str().unwrap());
    app.put_as(&operator, &uri, json!({ "title": "  ab  " }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let stored: Value = app.get_as(&operator, &uri).await.json();
    assert_eq!(stored["title"], "Pothole");
}

#[tokio::test]
async fn test_viewer_cannot_create_report() {
    let app = TestApp::new().await;
    let viewer = app.create_user("viewer1", SystemRole::Viewer).await;

    let response = app
        .post_as(&viewer, "/api/v1/reports", report_payload("Graffiti", CATEGORY_GREEN_AREAS))
        .await;
    response.assert_forbidden();

    app.get_as(&viewer, "/api/v1/reports").await.assert_ok();
}

#[tokio::test]
async fn test_get_unknown_report_returns_not_found() {
    let app = TestApp::new().await;
    let viewer = app.create_user("viewer1", SystemRole::Viewer).await;

    let response = app
        .get_as(&viewer, &format!("/api/v1/reports/{}", uuid::Uuid::new_v4()))
        .await;
    response.assert_not_found();
    assert_eq!(response.error_type(), "not_found");
}

#[tokio::test]
async fn test_list_reports_filters_and_paging() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    for (title, category) in [
        ("Pothole near school", CATEGORY_POTHOLES),
        ("Pothole on bridge", CATEGORY_POTHOLES),
        ("Lamp post down", CATEGORY_LIGHTING),
        ("Water main burst", CATEGORY_WATER),
    ] {
        app.post_as(&operator, "/api/v1/reports", report_payload(title, category))
            .await
            .assert_created();
    }

    let page: Value = app.get_as(&operator, "/api/v1/reports").await.json();
    assert_eq!(page["total"], 4);
    assert_eq!(page["page"], 1);

    let page: Value = app
        .get_as(
            &operator,
            &format!("/api/v1/reports?category_id={}", CATEGORY_POTHOLES),
        )
        .await
        .json();
    assert_eq!(page["total"], 2);

    let page: Value = app
        .get_as(&operator, "/api/v1/reports?q=bridge")
        .await
        .json();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["title"], "Pothole on bridge");

    let page: Value = app
        .get_as(&operator, "/api/v1/reports?page_size=3&page=2&sort=number&order=asc")
        .await
        .json();
    assert_eq!(page["total"], 4);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["items"][0]["folio"], "REP-000004");

    let page: Value = app
        .get_as(&operator, "/api/v1/reports?assigned_to=unassigned&open=true")
        .await
        .json();
    assert_eq!(page["total"], 4);
}

#[tokio::test]
async fn test_text_search_treats_wildcards_literally() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    for title in ["Bache cubre 50% del carril", "Bache de 500 m"] {
        app.post_as(&operator, "/api/v1/reports", report_payload(title, CATEGORY_POTHOLES))
            .await
            .assert_created();
    }

    let page: Value = app.get_as(&operator, "/api/v1/reports?q=50%25").await.json();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["title"], "Bache cubre 50% del carril");

    let page: Value = app.get_as(&operator, "/api/v1/reports?q=_").await.json();
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_list_reports_rejects_bad_filters() {
    let app = TestApp::new().await;
    let viewer = app.create_user("viewer1", SystemRole::Viewer).await;

    app.get_as(&viewer, "/api/v1/reports?assigned_to=someone")
        .await
        .assert_bad_request();

    app.get_as(
        &viewer,
        "/api/v1/reports?from=2026-05-01T00:00:00Z&to=2026-04-01T00:00:00Z",
    )
    .await
    .assert_bad_request();
}

#[tokio::test]
async fn test_update_report_fields() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    let report: Value = app
        .post_as(&operator, "/api/v1/reports", report_payload("Fallen tree", CATEGORY_GREEN_AREAS))
        .await
        .json();
    let id = report["id"].as_str().unwrap();

    let response = app
        .put_as(
            &operator,
            &format!("/api/v1/reports/{}", id),
            json!({ "title": "Fallen tree on sidewalk", "address": "Calle 5 de Mayo 12" }),
        )
        .await;
    response.assert_ok();
    let updated: Value = response.json();
    assert_eq!(updated["title"], "Fallen tree on sidewalk");
    assert_eq!(updated["address"], "Calle 5 de Mayo 12");

    let history: Vec<Value> = app
        .get_as(&operator, &format!("/api/v1/reports/{}/history", id))
        .await
        .json();
    let updates: Vec<&Value> = history.iter().filter(|h| h["action"] == "updated").collect();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().any(|h| h["field"] == "title"
        && h["old_value"] == "Fallen tree"
        && h["new_value"] == "Fallen tree on sidewalk"));
}

#[tokio::test]
async fn test_update_without_changes_writes_no_history() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    let report: Value = app
        .post_as(&operator, "/api/v1/reports", report_payload("Fallen tree", CATEGORY_GREEN_AREAS))
        .await
        .json();
    let id = report["id"].as_str().unwrap();

    app.put_as(
        &operator,
        &format!("/api/v1/reports/{}", id),
        json!({ "title": "Fallen tree" }),
    )
    .await
    .assert_ok();
    app.put_as(
        &operator,
        &format!("/api/v1/reports/{}/priority", id),
        json!({ "priority": "medium" }),
    )
    .await
    .assert_ok();

    let history: Vec<Value> = app
        .get_as(&operator, &format!("/api/v1/reports/{}/history", id))
        .await
        .json();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_delete_report_keeps_history() {
    let app = TestApp::new().await;
    let admin = app.create_admin("root").await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    let report: Value = app
        .post_as(&operator, "/api/v1/reports", report_payload("Duplicate report", CATEGORY_WASTE))
        .await
        .json();
    let id = report["id"].as_str().unwrap();

    // Operators have no delete permission
    app.delete_as(&operator, &format!("/api/v1/reports/{}", id))
        .await
        .assert_forbidden();

    app.delete_as(&admin, &format!("/api/v1/reports/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.get_as(&admin, &format!("/api/v1/reports/{}", id))
        .await
        .assert_not_found();

    let history: Vec<Value> = app
        .get_as(&admin, &format!("/api/v1/reports/{}/history", id))
        .await
        .json();
    assert_eq!(history.len(), 2);
    assert!(history.iter().any(|h| h["action"] == "deleted" && h["old_value"] == "REP-000001"));
}

#[tokio::test]
async fn test_map_returns_geojson_features() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    app.post_as(
        &operator,
        "/api/v1/reports",
        report_at("Pothole downtown", CATEGORY_POTHOLES, 19.43, -99.13),
    )
    .await
    .assert_created();
    app.post_as(
        &operator,
        "/api/v1/reports",
        report_at("Pothole far away", CATEGORY_POTHOLES, 20.67, -103.35),
    )
    .await
    .assert_created();

    let response = app.get_as(&operator, "/api/v1/map/reports").await;
    response.assert_ok();
    let map: Value = response.json();
    assert_eq!(map["type"], "FeatureCollection");
    assert_eq!(map["features"].as_array().unwrap().len(), 2);

    let map: Value = app
        .get_as(&operator, "/api/v1/map/reports?bbox=-99.5,19.0,-99.0,19.8")
        .await
        .json();
    let features = map["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["geometry"]["type"], "Point");
    assert_eq!(features[0]["geometry"]["coordinates"], json!([-99.13, 19.43]));
    assert_eq!(features[0]["properties"]["status"], "pending");

    app.get_as(&operator, "/api/v1/map/reports?bbox=1,2,3")
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_dashboard_summary_counts() {
    let app = TestApp::new().await;
    let operator = app.create_user("operator1", SystemRole::Operator).await;

    let factory = ReportFactory::new(CATEGORY_WATER);
    let mut ids = Vec::new();
    for body in factory.build_many(3) {
        let report: Value = app.post_as(&operator, "/api/v1/reports", body).await.json();
        ids.push(report["id"].as_str().unwrap().to_string());
    }

    app.put_as(
        &operator,
        &format!("/api/v1/reports/{}/status", ids[0]),
        json!({ "status_id": STATUS_RESOLVED }),
    )
    .await
    .assert_ok();

    let response = app.get_as(&operator, "/api/v1/dashboard/summary").await;
    response.assert_ok();
    let summary: Value = response.json();
    assert_eq!(summary["totals"]["total"], 3);
    assert_eq!(summary["totals"]["open"], 2);
    assert_eq!(summary["totals"]["closed"], 1);
    assert_eq!(summary["totals"]["unassigned_open"], 2);

    let water = summary["by_category"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["label"] == "Water leaks")
        .cloned()
        .unwrap();
    assert_eq!(water["count"], 3);
    assert!(!summary["recent_activity"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_accounts_are_managed_by_admins_only() {
    let app = TestApp::new().await;
    let admin = app.create_admin("root_admin").await;

    let permissions = ["users:update", "users:delete", "roles:assign"];
    let role: Value = app
        .post_as(&admin, "/api/v1/roles", role_payload("helpdesk", &permissions))
        .await
        .json();
    let role_id: uuid::Uuid = role["id"].as_str().unwrap().parse().unwrap();
    let helpdesk = app.insert_user("helpdesk1", role_id, false).await;
    let viewer = app.create_user("viewer1", SystemRole::Viewer).await;
    let admin_uri = format!("/api/v1/users/{}", admin.id);

    let response = app
        .put_as(&helpdesk, &admin_uri, json!({ "password": "Taken-Over-Pass-123!" }))
        .await;
    response.assert_forbidden();
    app.put_as(&helpdesk, &admin_uri, json!({ "email": "someone@example.com" }))
        .await
        .assert_forbidden();
    app.post_as(&helpdesk, &format!("{}/deactivate", admin_uri), json!({}))
        .await
        .assert_forbidden();
    app.put_as(
        &helpdesk,
        &format!("{}/role", admin_uri),
        json!({ "role_id": SystemRole::Viewer.uuid() }),
    )
    .await
    .assert_forbidden();

    app.post_json(
        "/api/v1/auth/login",
        json!({ "username": "root_admin", "password": "Taken-Over-Pass-123!" }),
    )
    .await
    .assert_unauthorized();
    app.get_as(&admin, "/api/v1/auth/me").await.assert_ok();

    // Regular accounts stay manageable
    app.put_as(
        &helpdesk,
        &format!("/api/v1/users/{}", viewer.id),
        json!({ "full_name": "Vera Viewer" }),
    )
    .await
    .assert_ok();
}

#[tokio::test]
async fn test_role_name_must_be_identifier() {
    let app = TestApp::new().await;
    let admin = app.create_admin("root").await;

    let response = app
        .post_as(&admin, "/api/v1/roles", role_payload("Field Crew!!", &[]))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.error_type(), "validation_error");

    let role: Value = app
        .post_as(&admin, "/api/v1/roles", role_payload("field_crew", &[]))
        .await
        .json();
    app.put_as(
        &admin,
        &format!("/api/v1/roles/{}", role["id"].as_str().unwrap()),
        json!({ "name": "Field Crew" }),
    )
    .await
    .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}
