//! memberlink application composition root
//!
//! Builds the collaborators selected by configuration and composes the
//! verification router with the shared infrastructure routes.

use axum::Router;
use memberlink_auth::{AuthBackend, AuthConfig};
use memberlink_common::{Config, TokenStoreKind};
use memberlink_email::{EmailConfig, EmailServiceFactory};
use memberlink_role_connection::{RoleConnectionConfig, RoleConnectionServiceFactory};
use memberlink_verification::{
    InMemoryMembershipDirectory, InMemoryTokenStore, MembershipDirectory, PgMembershipDirectory,
    PgTokenStore, TokenStore, VerificationService, VerificationSettings, VerificationState,
};
use sqlx::PgPool;
use std::sync::Arc;

/// Create the main application router from configuration.
///
/// `pool` is required when the postgres token store is selected; when present
/// it also backs the membership directory. Must be called inside a Tokio
/// runtime, which also runs the expired-token sweep.
pub async fn create_app(config: Config, pool: Option<PgPool>) -> Result<Router, anyhow::Error> {
    let store: Arc<dyn TokenStore> = match (config.token_store, pool.as_ref()) {
        (TokenStoreKind::Postgres, Some(pool)) => Arc::new(PgTokenStore::new(pool.clone())),
        (TokenStoreKind::Postgres, None) => {
            anyhow::bail!("TOKEN_STORE=postgres requires a database connection")
        }
        (TokenStoreKind::Memory, _) => {
            tracing::warn!("Using in-memory token store; pending verifications are lost on restart");
            Arc::new(InMemoryTokenStore::new())
        }
    };

    let members: Arc<dyn MembershipDirectory> = match pool {
        Some(pool) => Arc::new(PgMembershipDirectory::new(pool)),
        None => {
            tracing::warn!("No database configured; every caller resolves as a non-member");
            Arc::new(InMemoryMembershipDirectory::new())
        }
    };

    // Create email service from environment
    let email_config = EmailConfig::from_env()?;
    let email_service = EmailServiceFactory::create(email_config).await?;

    // Create role connection client from environment
    let role_connection_config = RoleConnectionConfig::from_env()?;
    let role_connections = RoleConnectionServiceFactory::create(role_connection_config)?;

    let auth = AuthBackend::new(AuthConfig {
        jwt_secret: config.jwt_secret.clone(),
        issuer: config.jwt_issuer.clone(),
        audience: config.jwt_audience.clone(),
    });

    let service = Arc::new(VerificationService::new(
        store,
        Arc::from(email_service),
        members,
        Arc::from(role_connections),
        VerificationSettings::from_config(&config),
    )?);

    // Detached: the sweep lives as long as the process
    service.spawn_purge_task();
    tracing::info!(
        interval_secs = config.purge_interval_secs,
        "Expired token sweep scheduled"
    );

    let state = VerificationState { service, auth };

    Ok(build_router(state))
}

/// Compose the verification routes with the infrastructure routes
pub fn build_router(state: VerificationState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route(
            "/",
            axum::routing::get(|| async { concat!("memberlink v", env!("CARGO_PKG_VERSION")) }),
        )
        .merge(memberlink_verification::routes().with_state(state))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
