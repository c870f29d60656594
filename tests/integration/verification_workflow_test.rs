//! Email verification workflow integration tests
//!
//! Drives the full router: request a link, pull the token out of the captured
//! email, follow the link as a browser would, and check what reached the role
//! connection service.

mod common;

use axum::http::{Method, StatusCode};
use memberlink_role_connection::RoleConnectionMetadata;
use serde_json::json;

use crate::common::{assert_error_code, Credentials, TestApp, TEST_HOST};

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Method::GET, "/health", Credentials::Anonymous, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("OK"));
}

mod test_request_verification {
    use super::*;

    #[tokio::test]
    async fn test_request_sends_email_without_leaking_token() {
        let app = TestApp::new();

        let (status, body) = app.request_verification("1001", "a@x.com").await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "sent");
        assert!(body["expires_at"].is_string());
        assert!(body.get("token").is_none());

        let token = app.mailed_token("a@x.com");
        assert!(!body.to_string().contains(&token));

        let mail = app.email.get_latest_verification_email("a@x.com").unwrap();
        assert_eq!(
            mail.message.subject,
            "Hey from ProgSoc! Verify your email for our Discord server!"
        );
        assert_eq!(
            mail.extract_callback_url().unwrap(),
            format!("{TEST_HOST}/api/email/callback?token={token}")
        );

        let entry = app.store.peek(&token).unwrap();
        assert_eq!(entry.email, "a@x.com");
        assert_eq!(entry.user_id, "1001");
    }

    #[tokio::test]
    async fn test_request_requires_authentication() {
        let app = TestApp::new();

        let (status, body) = app
            .send(
                Method::POST,
                "/api/email/verify",
                Credentials::Anonymous,
                Some(json!({ "email": "a@x.com" })),
            )
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_error_code(&body, "MISSING_AUTHORIZATION");
        assert_eq!(app.email.email_count(), 0);
    }

    #[tokio::test]
    async fn test_request_rejects_malformed_email() {
        let app = TestApp::new();

        let (status, body) = app.request_verification("1001", "not-an-email").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_error_code(&body, "VALIDATION_ERROR");
        assert!(app.store.is_empty());
        assert_eq!(app.email.email_count(), 0);
    }

    #[tokio::test]
    async fn test_request_rejects_missing_email_field() {
        let app = TestApp::new();
        let jwt = app.jwt_for("1001");

        let (status, _) = app
            .send(
                Method::POST,
                "/api/email/verify",
                Credentials::Bearer(&jwt),
                Some(json!({})),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_mail_failure_is_bad_gateway_and_leaves_no_token() {
        let app = TestApp::new();
        app.email.set_failing(true);

        let (status, body) = app.request_verification("1001", "a@x.com").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_error_code(&body, "UPSTREAM_ERROR");
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_requests_keep_earlier_links_valid() {
        let app = TestApp::new();

        app.request_verification("1001", "a@x.com").await;
        let first = app.mailed_token("a@x.com");
        app.email.clear();
        app.request_verification("1001", "a@x.com").await;
        let second = app.mailed_token("a@x.com");

        assert_ne!(first, second);
        assert_eq!(app.store.len(), 2);

        let (status, _) = app.follow_link("1001", &first).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.follow_link("1001", &second).await;
        assert_eq!(status, StatusCode::OK);
    }
}

mod test_callback {
    use super::*;

    #[tokio::test]
    async fn test_end_to_end_member_verification() {
        let app = TestApp::new();
        app.members.add_member("a@x.com", "2026-06-01T00:00:00Z");

        app.request_verification("user-1", "a@x.com").await;
        let token = app.mailed_token("a@x.com");
        assert_eq!(app.store.len(), 1);

        let (status, body) = app.follow_link("user-1", &token).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "member": 1, "expiry": "2026-06-01T00:00:00Z" }));
        assert_eq!(
            app.role_connections.latest_for("user-1"),
            Some(RoleConnectionMetadata::member("2026-06-01T00:00:00Z"))
        );
        assert!(app.store.is_empty());

        let (status, body) = app.follow_link("user-1", &token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_error_code(&body, "INVALID_TOKEN");
        assert_eq!(app.role_connections.recorded_pushes().len(), 1);
    }

    #[tokio::test]
    async fn test_non_member_gets_lapsed_expiry() {
        let app = TestApp::new();

        app.request_verification("user-2", "b@x.com").await;
        let token = app.mailed_token("b@x.com");
        let before = chrono::Utc::now() - chrono::Duration::days(1);

        let (status, body) = app.follow_link("user-2", &token).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["member"], 0);
        let expiry = body["expiry"].as_str().unwrap();
        assert!(expiry.ends_with('Z'));
        let expiry = chrono::DateTime::parse_from_rfc3339(expiry).unwrap();
        let drift = (expiry.with_timezone(&chrono::Utc) - before).num_milliseconds().abs();
        assert!(drift <= 1000, "expiry drifted {drift}ms from now - 1 day");
    }

    #[tokio::test]
    async fn test_bearer_header_works_for_callback() {
        let app = TestApp::new();
        app.request_verification("user-1", "a@x.com").await;
        let token = app.mailed_token("a@x.com");
        let jwt = app.jwt_for("user-1");

        let (status, _) = app
            .send(
                Method::GET,
                &format!("/api/email/callback?token={token}"),
                Credentials::Bearer(&jwt),
                None,
            )
            .await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_link_opened_by_other_account_is_forbidden() {
        let app = TestApp::new();
        app.request_verification("user-a", "a@x.com").await;
        let token = app.mailed_token("a@x.com");

        let (status, body) = app.follow_link("user-b", &token).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_error_code(&body, "IDENTITY_MISMATCH");
        assert!(app.role_connections.recorded_pushes().is_empty());
        assert!(app.store.peek(&token).is_some());

        let (status, _) = app.follow_link("user-a", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.role_connections.latest_for("user-b").is_none());
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let app = TestApp::new();

        let (status, body) = app.follow_link("user-1", "bogus-token").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_error_code(&body, "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_missing_token_parameter() {
        let app = TestApp::new();
        let jwt = app.jwt_for("user-1");

        for uri in ["/api/email/callback", "/api/email/callback?token="] {
            let (status, body) = app
                .send(Method::GET, uri, Credentials::Cookie(&jwt), None)
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "uri {uri}");
            assert_error_code(&body, "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_callback_requires_session() {
        let app = TestApp::new();
        app.request_verification("user-1", "a@x.com").await;
        let token = app.mailed_token("a@x.com");

        let (status, _) = app
            .send(
                Method::GET,
                &format!("/api/email/callback?token={token}"),
                Credentials::Anonymous,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let forged = app.jwt_with_secret("user-1", "not-the-secret");
        let (status, body) = app
            .send(
                Method::GET,
                &format!("/api/email/callback?token={token}"),
                Credentials::Cookie(&forged),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_error_code(&body, "INVALID_SESSION");

        assert!(app.store.peek(&token).is_some());
    }

    #[tokio::test]
    async fn test_failed_push_keeps_link_usable() {
        let app = TestApp::new();
        app.request_verification("user-1", "a@x.com").await;
        let token = app.mailed_token("a@x.com");

        app.role_connections.set_failing(true);
        let (status, body) = app.follow_link("user-1", &token).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_error_code(&body, "UPSTREAM_ERROR");
        assert!(app.store.peek(&token).is_some());

        app.role_connections.set_failing(false);
        let (status, _) = app.follow_link("user-1", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn test_tokens_do_not_interfere() {
        let app = TestApp::new();
        app.members.add_member("one@x.com", "2026-06-01T00:00:00Z");

        app.request_verification("user-1", "one@x.com").await;
        app.request_verification("user-2", "two@x.com").await;
        let t1 = app.mailed_token("one@x.com");
        let t2 = app.mailed_token("two@x.com");

        let (status, body) = app.follow_link("user-1", &t1).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["member"], 1);

        let entry = app.store.peek(&t2).unwrap();
        assert_eq!(entry.email, "two@x.com");
        assert_eq!(entry.user_id, "user-2");

        let (status, body) = app.follow_link("user-2", &t2).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["member"], 0);
    }
}
