//! Common test utilities and fixtures for integration tests
//!
//! This module provides shared infrastructure for all integration tests:
//! - A fully wired router backed by in-memory collaborators
//! - Session JWT minting for test callers
//! - Request helpers returning status and decoded JSON body

#![allow(dead_code)]

use std::env;
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use memberlink_auth::{AuthBackend, AuthConfig, SessionClaims, SESSION_COOKIE};
use memberlink_email::mock::MockEmailService;
use memberlink_role_connection::mock::MockRoleConnectionService;
use memberlink_verification::{
    InMemoryMembershipDirectory, InMemoryTokenStore, VerificationService, VerificationSettings,
    VerificationState,
};
use serde_json::Value;
use tower::ServiceExt;

static INIT: Once = Once::new();

pub const TEST_HOST: &str = "https://link.progsoc.test";

/// Test environment configuration
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub database_url: Option<String>,
    pub jwt_secret: String,
}

impl TestConfig {
    pub fn from_env() -> Self {
        // Ensure test environment variables are loaded
        INIT.call_once(|| {
            dotenvy::from_filename(".env.test").ok();
            dotenvy::dotenv().ok();
        });

        Self {
            database_url: env::var("TEST_DATABASE_URL").ok(),
            jwt_secret: env::var("TEST_JWT_SECRET")
                .unwrap_or_else(|_| "test_secret_key_for_testing_only".to_string()),
        }
    }
}

/// How a test request presents the caller's session
#[derive(Debug, Clone, Copy)]
pub enum Credentials<'a> {
    Anonymous,
    Bearer(&'a str),
    Cookie(&'a str),
}

/// Router plus handles on every in-memory collaborator behind it
pub struct TestApp {
    pub router: Router,
    pub config: TestConfig,
    pub store: InMemoryTokenStore,
    pub email: MockEmailService,
    pub members: InMemoryMembershipDirectory,
    pub role_connections: MockRoleConnectionService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(VerificationSettings {
            app_host: TEST_HOST.to_string(),
            token_ttl: Duration::from_secs(24 * 60 * 60),
            claim_lease: Duration::from_secs(120),
            downstream_timeout: Duration::from_secs(5),
            purge_interval: Duration::from_secs(300),
        })
    }

    pub fn with_settings(settings: VerificationSettings) -> Self {
        let config = TestConfig::from_env();

        let store = InMemoryTokenStore::new();
        let email = MockEmailService::new();
        let members = InMemoryMembershipDirectory::new();
        let role_connections = MockRoleConnectionService::new();

        let service = VerificationService::new(
            Arc::new(store.clone()),
            Arc::new(email.clone()),
            Arc::new(members.clone()),
            Arc::new(role_connections.clone()),
            settings,
        )
        .expect("test settings are valid");

        let state = VerificationState {
            service: Arc::new(service),
            auth: AuthBackend::new(AuthConfig {
                jwt_secret: config.jwt_secret.clone(),
                issuer: None,
                audience: None,
            }),
        };

        Self {
            router: memberlink_app::build_router(state),
            config,
            store,
            email,
            members,
            role_connections,
        }
    }

    /// Mint a session JWT for `user_id`, valid for one hour
    pub fn jwt_for(&self, user_id: &str) -> String {
        self.jwt_with_secret(user_id, &self.config.jwt_secret)
    }

    pub fn jwt_with_secret(&self, user_id: &str, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = SessionClaims {
            sub: user_id.to_string(),
            username: Some(format!("{user_id}#0001")),
            iat: now,
            exp: now + 3600,
            aud: None,
            iss: None,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode test JWT")
    }

    /// Send a request and return its status and body (JSON when possible)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        credentials: Credentials<'_>,
        json_body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        builder = match credentials {
            Credentials::Anonymous => builder,
            Credentials::Bearer(jwt) => {
                builder.header(header::AUTHORIZATION, format!("Bearer {jwt}"))
            }
            Credentials::Cookie(jwt) => {
                builder.header(header::COOKIE, format!("theme=dark; {SESSION_COOKIE}={jwt}"))
            }
        };

        let body = match json_body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        (status, value)
    }

    /// POST /api/email/verify as `user_id`
    pub async fn request_verification(&self, user_id: &str, email: &str) -> (StatusCode, Value) {
        let jwt = self.jwt_for(user_id);
        self.send(
            Method::POST,
            "/api/email/verify",
            Credentials::Bearer(&jwt),
            Some(serde_json::json!({ "email": email })),
        )
        .await
    }

    /// GET /api/email/callback as `user_id`, the way a browser follows the link
    pub async fn follow_link(&self, user_id: &str, token: &str) -> (StatusCode, Value) {
        let jwt = self.jwt_for(user_id);
        self.send(
            Method::GET,
            &format!("/api/email/callback?token={token}"),
            Credentials::Cookie(&jwt),
            None,
        )
        .await
    }

    /// Token from the latest verification email sent to `email`
    pub fn mailed_token(&self, email: &str) -> String {
        self.email
            .get_token_for_email(email)
            .expect("verification email with token")
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert the standard error body shape and code
pub fn assert_error_code(body: &Value, code: &str) {
    assert_eq!(
        body["error"]["code"], code,
        "unexpected error body: {body}"
    );
}
