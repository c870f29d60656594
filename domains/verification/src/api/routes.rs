//! Route definitions for the verification API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::email;
use super::middleware::VerificationState;

/// Create all verification routes
pub fn routes() -> Router<VerificationState> {
    Router::new()
        .route("/api/email/verify", post(email::request_verification))
        .route("/api/email/callback", get(email::verification_callback))
}
