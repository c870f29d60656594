//! Shared utilities, configuration, and error handling for memberlink
//!
//! This crate provides common functionality used across the service:
//! - Configuration management following 12-factor principles
//! - Error types and their HTTP mapping
//! - Verification token generation
//! - Validating axum extractors

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;

pub use config::{Config, TokenStoreKind};
pub use crypto::{generate_token, token_fingerprint, TOKEN_BYTES};
pub use db::RepositoryError;
pub use error::{Error, Result};
pub use extractors::{ValidatedJson, ValidatedQuery};
