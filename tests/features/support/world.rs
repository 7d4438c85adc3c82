//! Test world for Cucumber scenarios

use std::collections::HashMap;

use cucumber::World;
use serde_json::Value;

use civic_reports::models::SystemRole;

use crate::common::{TestApp, TestResponse, TestUser};

/// Test world that maintains state across scenario steps
#[derive(Default, World)]
pub struct TestWorld {
    /// Started by the background step, one database per scenario
    pub app: Option<TestApp>,

    /// Users created in the scenario, by username
    pub users: HashMap<String, TestUser>,

    /// Username the next requests are made as
    pub current_user: Option<String>,

    /// Report ids by title
    pub reports: HashMap<String, String>,

    /// Response from last API call
    pub last_response: Option<TestResponse>,
}

impl std::fmt::Debug for TestWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestWorld")
            .field("started", &self.app.is_some())
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .field("current_user", &self.current_user)
            .field("reports", &self.reports)
            .field("last_response", &self.last_response)
            .finish()
    }
}

impl TestWorld {
    pub fn app(&self) -> &TestApp {
        self.app
            .as_ref()
            .expect("The service was not started in this scenario")
    }

    pub fn user(&self, username: &str) -> &TestUser {
        self.users
            .get(username)
            .unwrap_or_else(|| panic!("Unknown user '{}'", username))
    }

    pub fn current(&self) -> &TestUser {
        let username = self.current_user.as_deref().expect("Nobody is signed in");
        self.user(username)
    }

    pub fn report_id(&self, title: &str) -> &str {
        self.reports
            .get(title)
            .unwrap_or_else(|| panic!("Unknown report '{}'", title))
    }

    /// Fetch a report as the signed in user
    pub async fn report(&self, title: &str) -> Value {
        let uri = format!("/api/v1/reports/{}", self.report_id(title));
        let response = self.app().get_as(self.current(), &uri).await;
        response.assert_ok();
        response.json()
    }

    /// Remember the id of a report the last request created
    pub fn remember_report(&mut self, title: &str) {
        let created = self
            .last_response
            .as_ref()
            .filter(|r| r.status.is_success())
            .map(|r| r.json::<Value>());
        if let Some(report) = created {
            let id = report["id"].as_str().unwrap_or_default().to_string();
            self.reports.insert(title.to_string(), id);
        }
    }

    pub fn last_json(&self) -> Value {
        self.last_response
            .as_ref()
            .expect("No response available")
            .json()
    }
}

pub fn system_role(name: &str) -> SystemRole {
    match name {
        "admin" => SystemRole::Admin,
        "operator" => SystemRole::Operator,
        "viewer" => SystemRole::Viewer,
        other => panic!("Unknown role '{}'", other),
    }
}
