//! Test application setup utilities
//!
//! Builds the real router over a throwaway SQLite file with migrations and
//! seeds applied, plus helpers to create users and sign requests as them.

use axum::{body::Body, http::Request, Router};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use civic_reports::{
    api,
    config::AppConfig,
    db::{self, UserRepository},
    middleware::{create_access_token, rate_limit::RateLimitConfig, RateLimitState},
    models::{SystemRole, User},
    services::AuthService,
    AppState,
};

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    db_path: String,
}

/// A user that exists in the test database, with a valid token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub token: String,
}

impl TestApp {
    /// Create a new test application with a fresh database
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Test application whose geocoder talks to `base_url`
    pub async fn with_geocoder(base_url: &str) -> Self {
        let mut config = test_config();
        config.geocoding.enabled = true;
        config.geocoding.base_url = base_url.to_string();
        config.geocoding.timeout_secs = 2;
        Self::with_config(config).await
    }

    /// Create a new test application with custom configuration
    pub async fn with_config(config: AppConfig) -> Self {
        let db_path = config
            .database
            .url
            .trim_start_matches("sqlite://")
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();

        let pool = db::init_pool(&config.database)
            .await
            .expect("Failed to initialize test database");
        let state = AppState::new(config, pool).expect("Failed to build application state");

        // Generous enough that only the dedicated test hits the limit
        let login_limit = RateLimitState::new(RateLimitConfig {
            requests_per_second: 100,
            burst_size: 100,
        });

        let router = Router::new()
            .nest("/api/v1", api::routes(state.clone(), login_limit))
            .with_state(state.clone());

        Self {
            router,
            state,
            db_path,
        }
    }

    /// Insert a user holding `role` and sign a token for them.
    ///
    /// The stored hash is not a real password hash, so these users can only
    /// authenticate with the returned token.
    pub async fn create_user(&self, username: &str, role: SystemRole) -> TestUser {
        self.insert_user(username, role.uuid(), false).await
    }

    /// An administrator (admin role and admin flag)
    pub async fn create_admin(&self, username: &str) -> TestUser {
        self.insert_user(username, SystemRole::Admin.uuid(), true).await
    }

    pub async fn insert_user(&self, username: &str, role_id: Uuid, is_admin: bool) -> TestUser {
        let mut user = User::new(
            username.to_string(),
            format!("{}@example.com", username),
            format!("Test {}", username),
            "not-a-password-hash".to_string(),
            role_id,
        );
        user.is_admin = is_admin;

        let mut conn = self.state.db.acquire().await.expect("Failed to acquire connection");
        UserRepository::insert(&mut conn, &user)
            .await
            .expect("Failed to insert test user");
        drop(conn);

        TestUser {
            id: user.id,
            username: user.username.clone(),
            token: self.token_for(user.id).await,
        }
    }

    /// Fresh token for an existing active user
    pub async fn token_for(&self, user_id: Uuid) -> String {
        let principal = AuthService::new(self.state.db.clone())
            .load_principal(user_id)
            .await
            .expect("Failed to load user")
            .expect("User is missing or inactive");

        create_access_token(
            &principal.user,
            &principal.role,
            &self.state.config.auth.jwt_secret,
            1,
        )
        .expect("Failed to create token")
    }

    /// Make a GET request to the test application
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send("GET", uri, None, None).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send("POST", uri, None, Some(body)).await
    }

    pub async fn get_as(&self, user: &TestUser, uri: &str) -> TestResponse {
        self.send("GET", uri, Some(&user.token), None).await
    }

    pub async fn post_as(&self, user: &TestUser, uri: &str, body: Value) -> TestResponse {
        self.send("POST", uri, Some(&user.token), Some(body)).await
    }

    pub async fn put_as(&self, user: &TestUser, uri: &str, body: Value) -> TestResponse {
        self.send("PUT", uri, Some(&user.token), Some(body)).await
    }

    pub async fn delete_as(&self, user: &TestUser, uri: &str) -> TestResponse {
        self.send("DELETE", uri, Some(&user.token), None).await
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        self.request(request).await
    }

    /// Make an arbitrary request
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.db_path, suffix));
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: bytes::Bytes,
}

impl TestResponse {
    /// Get the response body as a string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse the response body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    /// Assert the response status
    pub fn assert_status(&self, expected: axum::http::StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    pub fn assert_created(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CREATED)
    }

    pub fn assert_bad_request(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::BAD_REQUEST)
    }

    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::UNAUTHORIZED)
    }

    pub fn assert_forbidden(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::FORBIDDEN)
    }

    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NOT_FOUND)
    }

    pub fn assert_conflict(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CONFLICT)
    }

    /// The machine readable `error` field of an error body
    pub fn error_type(&self) -> String {
        let body: Value = self.json();
        body["error"].as_str().unwrap_or_default().to_string()
    }
}

/// Create a test configuration with a temporary SQLite database
pub fn test_config() -> AppConfig {
    let db_path = std::env::temp_dir().join(format!("civic_test_{}.db", Uuid::new_v4().simple()));

    let mut config = AppConfig::default();
    config.server.static_dir = None;
    config.server.serve_frontend = false;
    config.database.url = format!("sqlite://{}?mode=rwc", db_path.display());
    config.database.max_connections = 5;
    config.auth.jwt_secret = "test_secret_key_that_is_at_least_32_bytes_long".to_string();
    config.auth.bootstrap_admin = None;
    // Unit under test never reaches the real Nominatim
    config.geocoding.enabled = false;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_creation() {
        let app = TestApp::new().await;
        assert!(!app.state.geocoder.is_enabled());
    }

    #[tokio::test]
    async fn test_created_user_token_is_accepted() {
        let app = TestApp::new().await;
        let viewer = app.create_user("viewer1", SystemRole::Viewer).await;

        let response = app.get_as(&viewer, "/api/v1/auth/me").await;
        response.assert_ok();
        let body: Value = response.json();
        assert_eq!(body["user"]["username"], "viewer1");
    }
}
