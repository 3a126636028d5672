//! Test application setup utilities
//!
//! Provides utilities for setting up test instances of the application
//! with throwaway databases and an optional mocked login gateway.

use std::sync::Arc;

use axum::{body::Body, http::Request, Router};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use tower::ServiceExt;
use uuid::Uuid;

use wechat_admin::{
    api,
    config::{
        AppConfig, AuthConfig, BootstrapAdmin, DatabaseConfig, GatewayConfig, LoggingConfig,
        ServerConfig,
    },
    db,
    middleware::auth::{Claims, TokenType},
    models::Role,
    services::{AuthService, GatewayClient},
    AppState,
};

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Create a new test application with a throwaway SQLite database
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Create a new test application pointed at a mock login gateway
    pub async fn with_gateway(gateway_url: &str) -> Self {
        let mut config = test_config();
        config.gateway = Some(GatewayConfig {
            url: gateway_url.to_string(),
            timeout_secs: 5,
        });
        Self::with_config(config).await
    }

    /// Create a new test application with custom configuration
    pub async fn with_config(config: AppConfig) -> Self {
        // Initialize the database
        let db = db::init_pool(&config.database)
            .await
            .expect("Failed to initialize test database");

        // Seed the bootstrap admin the same way main() does
        AuthService::new(db.clone())
            .ensure_seed_admin(&config.auth)
            .await
            .expect("Failed to seed test admin");

        // Build the gateway client if configured
        let gateway = config.gateway.as_ref().map(|gateway_config| {
            Arc::new(
                GatewayClient::new(gateway_config).expect("Failed to build test gateway client"),
            )
        });

        // Create application state
        let state = AppState {
            config,
            db,
            gateway,
        };

        // Build the router
        let router = Router::new()
            .merge(api::public_routes())
            .merge(
                api::protected_routes().layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    wechat_admin::middleware::auth_middleware,
                )),
            )
            .with_state(state.clone());

        Self { router, state }
    }

    /// Log in and return the bearer token
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .post_json(
                "/api/auth/login",
                serde_json::json!({"username": username, "password": password}),
            )
            .await;
        response.assert_ok();
        let json: serde_json::Value = response.json();
        json["token"]
            .as_str()
            .expect("Login response missing token")
            .to_string()
    }

    /// Token for the seeded admin account
    pub async fn admin_token(&self) -> String {
        self.login("admin", "admin123").await
    }

    /// Register a user and return their bearer token
    pub async fn register_and_login(&self, username: &str, password: &str) -> String {
        let response = self
            .post_json(
                "/api/auth/register",
                serde_json::json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": password,
                }),
            )
            .await;
        response.assert_created();
        self.login(username, password).await
    }

    /// Make a GET request to the test application
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated GET request
    pub async fn get_auth(&self, uri: &str, token: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json_auth(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: &str,
    ) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated PUT request with JSON body
    pub async fn put_json_auth(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: &str,
    ) -> TestResponse {
        self.request(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated DELETE request
    pub async fn delete_auth(&self, uri: &str, token: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
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

    /// Check if the response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
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

    /// Assert the response status is OK (200)
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    /// Assert the response status is Created (201)
    pub fn assert_created(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CREATED)
    }

    /// Assert the response status is Bad Request (400)
    pub fn assert_bad_request(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::BAD_REQUEST)
    }

    /// Assert the response status is Unauthorized (401)
    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::UNAUTHORIZED)
    }

    /// Assert the response status is Forbidden (403)
    pub fn assert_forbidden(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::FORBIDDEN)
    }

    /// Assert the response status is Not Found (404)
    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NOT_FOUND)
    }

    /// Assert the response status is Conflict (409)
    pub fn assert_conflict(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CONFLICT)
    }
}

/// Create a test configuration with a temporary SQLite database
pub fn test_config() -> AppConfig {
    // Use a unique temp file for each test to avoid conflicts
    let db_path = format!(
        "/tmp/wechat_admin_test_{}.db",
        Uuid::new_v4().to_string().replace('-', "")
    );

    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3001,
            workers: 1,
            request_timeout_secs: None,
            tls: None,
            static_dir: None,
            serve_frontend: false,
        },
        database: DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", db_path),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        },
        auth: AuthConfig {
            jwt_secret: "test_secret_key_that_is_at_least_32_bytes_long".to_string(),
            token_expiry_hours: 24,
            password_min_length: 8,
            bootstrap_admin: BootstrapAdmin::Seed,
            seed_username: "admin".to_string(),
            seed_password: "admin123".to_string(),
            seed_email: "admin@example.com".to_string(),
        },
        gateway: None,
        logging: LoggingConfig::default(),
    }
}

/// Generate a test JWT token for authentication
pub fn generate_test_token(config: &AppConfig, user_id: Uuid, username: &str, role: Role) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        role,
        iat: now,
        exp: now + 3600,
        nbf: now,
        jti: Uuid::new_v4().to_string(),
        token_type: TokenType::Access,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.auth.jwt_secret.as_bytes()),
    )
    .expect("Failed to generate test token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_creation() {
        let app = TestApp::new().await;
        assert!(app.state.gateway.is_none());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = TestApp::new().await;
        let response = app.get("/health").await;
        response.assert_ok();
    }

    #[tokio::test]
    async fn test_response_json_parsing() {
        let app = TestApp::new().await;
        let response = app.get("/health").await;
        let json: serde_json::Value = response.json();
        assert!(json.get("status").is_some());
    }
}
