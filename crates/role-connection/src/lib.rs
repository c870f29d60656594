//! memberlink Role Connection Service
//!
//! Pushes membership metadata for a Discord user to the linked-roles
//! service with support for:
//! - An HTTP client for production
//! - A recording mock for testing and development

pub mod client;
pub mod mock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoleConnectionError {
    #[error("Role connection configuration error: {0}")]
    Configuration(String),

    #[error("Role connection request error: {0}")]
    Request(String),

    #[error("Role connection response error: {0}")]
    Response(String),
}

/// Membership metadata attached to a user's role connection.
///
/// `member` is `1` for an active member and `0` otherwise. `expiry` is an
/// ISO-8601 timestamp; a value in the past means "not currently valid".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConnectionMetadata {
    pub member: u8,
    pub expiry: String,
}

impl RoleConnectionMetadata {
    pub fn member(expiry: impl Into<String>) -> Self {
        Self {
            member: 1,
            expiry: expiry.into(),
        }
    }

    pub fn non_member(expiry: impl Into<String>) -> Self {
        Self {
            member: 0,
            expiry: expiry.into(),
        }
    }

    pub fn is_member(&self) -> bool {
        self.member == 1
    }
}

/// Role connection service configuration.
#[derive(Clone)]
pub struct RoleConnectionConfig {
    /// Provider (http, mock)
    pub provider: String,
    /// Base URL of the role connection API
    pub base_url: String,
    /// Bearer key authenticating this service
    pub api_key: String,
    /// Platform name shown on the user's connection
    pub platform_name: String,
}

impl std::fmt::Debug for RoleConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleConnectionConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("platform_name", &self.platform_name)
            .finish()
    }
}

impl RoleConnectionConfig {
    /// Create role connection config from environment variables.
    pub fn from_env() -> Result<Self, RoleConnectionError> {
        let provider =
            std::env::var("ROLE_CONNECTION_PROVIDER").unwrap_or_else(|_| "mock".to_string());

        let base_url = std::env::var("ROLE_CONNECTION_BASE_URL").unwrap_or_default();
        let api_key = std::env::var("ROLE_CONNECTION_API_KEY").unwrap_or_default();
        let platform_name = std::env::var("ROLE_CONNECTION_PLATFORM_NAME")
            .unwrap_or_else(|_| "ProgSoc Membership".to_string());

        let config = Self {
            provider,
            base_url,
            api_key,
            platform_name,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), RoleConnectionError> {
        if self.provider == "mock" {
            return Ok(());
        }
        if self.base_url.trim().is_empty() {
            return Err(RoleConnectionError::Configuration(
                "ROLE_CONNECTION_BASE_URL is required for the http provider".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(RoleConnectionError::Configuration(
                "ROLE_CONNECTION_API_KEY is required for the http provider".to_string(),
            ));
        }
        Ok(())
    }
}

/// Role connection service trait for different implementations.
#[async_trait::async_trait]
pub trait RoleConnectionService: Send + Sync {
    /// Replace the role connection metadata of `user_id`.
    async fn push_metadata(
        &self,
        user_id: &str,
        metadata: &RoleConnectionMetadata,
    ) -> Result<(), RoleConnectionError>;
}

/// Factory for creating RoleConnectionService implementations.
pub struct RoleConnectionServiceFactory;

impl RoleConnectionServiceFactory {
    /// Create a RoleConnectionService based on configuration.
    pub fn create(
        config: RoleConnectionConfig,
    ) -> Result<Box<dyn RoleConnectionService>, RoleConnectionError> {
        match config.provider.as_str() {
            "http" => {
                config.validate()?;
                tracing::info!(base_url = %config.base_url, "Creating role connection HTTP client");
                Ok(Box::new(client::RoleConnectionClient::new(config)))
            }
            "mock" => {
                tracing::info!("Creating mock role connection service");
                Ok(Box::new(mock::MockRoleConnectionService::new()))
            }
            provider => Err(RoleConnectionError::Configuration(format!(
                "Unknown role connection provider: {}. Supported providers: http, mock",
                provider
            ))),
        }
    }
}
