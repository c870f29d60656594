//! Caller authentication for memberlink
//!
//! Provides session JWT validation and axum extractors that work with any
//! domain state implementing `FromRef<S>` for `AuthBackend`. The subject of a
//! session token is the caller's Discord user id.

mod backend;
mod claims;
mod config;
mod context;
mod error;
mod extractors;
mod jwt;

pub use backend::AuthBackend;
pub use claims::SessionClaims;
pub use config::AuthConfig;
pub use context::AuthContext;
pub use error::AuthError;
pub use extractors::AuthUser;
pub use jwt::SESSION_COOKIE;
