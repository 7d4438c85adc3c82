//! Common step definitions used across features

use cucumber::{given, then};

use crate::common::TestApp;
use crate::features::support::world::system_role;
use crate::features::TestWorld;

#[given("the civic reports service is running")]
async fn service_running(world: &mut TestWorld) {
    world.app = Some(TestApp::new().await);
}

#[given(expr = "a user {string} with role {string}")]
async fn user_with_role(world: &mut TestWorld, username: String, role: String) {
    let user = world.app().create_user(&username, system_role(&role)).await;
    world.users.insert(username, user);
}

#[given(expr = "an administrator {string}")]
async fn administrator(world: &mut TestWorld, username: String) {
    let user = world.app().create_admin(&username).await;
    world.users.insert(username, user);
}

#[given(expr = "I am signed in as {string}")]
async fn signed_in_as(world: &mut TestWorld, username: String) {
    assert!(world.users.contains_key(&username), "Unknown user '{}'", username);
    world.current_user = Some(username);
}

#[then(expr = "the response status should be {int}")]
async fn response_status(world: &mut TestWorld, status: u16) {
    let response = world.last_response.as_ref().expect("No response available");
    assert_eq!(response.status.as_u16(), status, "Body: {}", response.text());
}

#[then("the response should contain an error")]
async fn response_contains_error(world: &mut TestWorld) {
    assert!(world.last_json().get("error").is_some());
}

#[then(expr = "{string} should have {int} unread notification(s)")]
async fn unread_notifications(world: &mut TestWorld, username: String, expected: i64) {
    let stats: serde_json::Value = world
        .app()
        .get_as(world.user(&username), "/api/v1/notifications/stats")
        .await
        .json();
    assert_eq!(stats["stats"]["unread"], expected);
}
