//! Verification domain state and auth backend integration

use crate::service::VerificationService;
use axum::extract::FromRef;
use memberlink_auth::AuthBackend;
use std::sync::Arc;

pub use memberlink_auth::AuthUser;

/// Application state for the verification domain
#[derive(Clone)]
pub struct VerificationState {
    pub service: Arc<VerificationService>,
    pub auth: AuthBackend,
}

impl FromRef<VerificationState> for AuthBackend {
    fn from_ref(state: &VerificationState) -> Self {
        state.auth.clone()
    }
}
