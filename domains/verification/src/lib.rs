//! Verification domain: token issuance, single-use redemption, role connection updates

pub mod api;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

// Re-export domain types at the crate root for convenience
pub use domain::entities::*;
pub use domain::state::{
    StateError, TokenEvent, TokenGuardContext, TokenState, TokenStateMachine,
};
pub use error::VerificationError;

// Re-export repository types
pub use repository::{
    ClaimOutcome, InMemoryMembershipDirectory, InMemoryTokenStore, MembershipDirectory,
    PgMembershipDirectory, PgTokenStore, TokenStore, MIGRATOR,
};

pub use service::{Clock, SystemClock, VerificationService, VerificationSettings};

// Re-export API types
pub use api::routes;
pub use api::VerificationState;

pub use memberlink_auth::{AuthBackend, AuthConfig, AuthContext, AuthError, AuthUser};
