//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config. Missing required values are
//! fatal: the service refuses to start rather than run half-configured.

use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;

/// Default validity window of an issued verification token (24 hours)
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Default lease held by an in-flight redemption before it may be reclaimed
pub const DEFAULT_CLAIM_LEASE_SECS: u64 = 120;

/// Default upper bound on any single downstream call
pub const DEFAULT_DOWNSTREAM_TIMEOUT_SECS: u64 = 30;

/// Default period of the expired-token sweep
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 5 * 60;

/// Backing store for pending verification entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStoreKind {
    Memory,
    Postgres,
}

impl std::str::FromStr for TokenStoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(anyhow!(
                "Unknown TOKEN_STORE: {}. Supported stores: memory, postgres",
                other
            )),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    /// Public base URL that verification links point at
    pub app_host: String,

    /// JWT verification for caller identities
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,

    /// Pending verification storage
    pub token_store: TokenStoreKind,
    pub database_url: Option<String>,

    /// Verification lifecycle tuning
    pub token_ttl_secs: u64,
    pub claim_lease_secs: u64,
    pub downstream_timeout_secs: u64,
    pub purge_interval_secs: u64,

    /// Runtime configuration
    pub rust_log: String,
    pub port: u16,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_host", &self.app_host)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("token_store", &self.token_store)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("claim_lease_secs", &self.claim_lease_secs)
            .field("downstream_timeout_secs", &self.downstream_timeout_secs)
            .field("purge_interval_secs", &self.purge_interval_secs)
            .field("rust_log", &self.rust_log)
            .field("port", &self.port)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("{} is required", key))
        };
        let seconds = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                Some(raw) => {
                    let secs: u64 = raw
                        .trim()
                        .parse()
                        .map_err(|_| anyhow!("{} must be a whole number of seconds", key))?;
                    if secs == 0 {
                        return Err(anyhow!("{} must be greater than zero", key));
                    }
                    Ok(secs)
                }
                None => Ok(default),
            }
        };

        let token_store: TokenStoreKind = lookup("TOKEN_STORE")
            .unwrap_or_else(|| "memory".to_string())
            .parse()?;

        let database_url = match token_store {
            TokenStoreKind::Postgres => Some(required("DATABASE_URL")?),
            TokenStoreKind::Memory => lookup("DATABASE_URL"),
        };

        let config = Self {
            app_host: required("APP_HOST")?.trim_end_matches('/').to_string(),

            jwt_secret: required("JWT_SECRET")?,
            jwt_issuer: lookup("JWT_ISSUER"),
            jwt_audience: lookup("JWT_AUDIENCE"),

            token_store,
            database_url,

            token_ttl_secs: seconds("VERIFICATION_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?,
            claim_lease_secs: seconds("REDEMPTION_CLAIM_LEASE_SECS", DEFAULT_CLAIM_LEASE_SECS)?,
            downstream_timeout_secs: seconds(
                "DOWNSTREAM_TIMEOUT_SECS",
                DEFAULT_DOWNSTREAM_TIMEOUT_SECS,
            )?,
            purge_interval_secs: seconds("PURGE_INTERVAL_SECS", DEFAULT_PURGE_INTERVAL_SECS)?,

            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "memberlink=debug".to_string()),
            port: lookup("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        };

        Ok(config)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }

    pub fn downstream_timeout(&self) -> Duration {
        Duration::from_secs(self.downstream_timeout_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}
