//! API layer for the verification domain
//!
//! Contains HTTP handlers, routes, and domain state definition.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use middleware::VerificationState;
pub use routes::routes;
