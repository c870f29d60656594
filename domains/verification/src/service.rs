//! Verification workflow: token issuance and single-use redemption
//!
//! Issuance stores a pending entry under a fresh token and mails the callback
//! link. Redemption claims the entry, looks up membership, pushes role
//! connection metadata and only then deletes the entry. A failed lookup or
//! push releases the claim so the owner can follow the link again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use memberlink_common::{generate_token, token_fingerprint, Config};
use memberlink_email::EmailService;
use memberlink_role_connection::{RoleConnectionMetadata, RoleConnectionService};

use crate::domain::entities::{membership_metadata, IssuedVerification, PendingVerification};
use crate::error::VerificationError;
use crate::repository::{ClaimOutcome, MembershipDirectory, TokenStore};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tunables for the workflow, usually taken from [`Config`]
#[derive(Debug, Clone)]
pub struct VerificationSettings {
    /// Public base URL the callback link is built on, without trailing slash
    pub app_host: String,
    pub token_ttl: Duration,
    /// Must outlast one redemption: a lookup plus a push, each bounded by
    /// `downstream_timeout`
    pub claim_lease: Duration,
    pub downstream_timeout: Duration,
    /// Period of the expired-token sweep
    pub purge_interval: Duration,
}

impl VerificationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            app_host: config.app_host.clone(),
            token_ttl: config.token_ttl(),
            claim_lease: config.claim_lease(),
            downstream_timeout: config.downstream_timeout(),
            purge_interval: config.purge_interval(),
        }
    }

    fn validate(&self) -> Result<(), VerificationError> {
        let host = self.app_host.trim_end_matches('/');
        let rest = host
            .strip_prefix("https://")
            .or_else(|| host.strip_prefix("http://"))
            .ok_or_else(|| {
                VerificationError::Configuration(
                    "APP_HOST must start with http:// or https://".to_string(),
                )
            })?;
        if rest.is_empty() {
            return Err(VerificationError::Configuration(
                "APP_HOST must include a host name".to_string(),
            ));
        }

        for (name, value) in [
            ("token TTL", self.token_ttl),
            ("claim lease", self.claim_lease),
            ("downstream timeout", self.downstream_timeout),
            ("purge interval", self.purge_interval),
        ] {
            if value.is_zero() {
                return Err(VerificationError::Configuration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let redemption_bound = self.downstream_timeout.checked_mul(2).ok_or_else(|| {
            VerificationError::Configuration("downstream timeout is out of range".to_string())
        })?;
        if self.claim_lease <= redemption_bound {
            return Err(VerificationError::Configuration(format!(
                "claim lease ({}s) must exceed twice the downstream timeout ({}s)",
                self.claim_lease.as_secs_f64(),
                self.downstream_timeout.as_secs_f64()
            )));
        }

        let now = Utc::now();
        for (name, value) in [("token TTL", self.token_ttl), ("claim lease", self.claim_lease)] {
            if now.checked_add_signed(to_chrono(value)?).is_none() {
                return Err(VerificationError::Configuration(format!(
                    "{name} is out of range"
                )));
            }
        }
        Ok(())
    }
}

fn to_chrono(value: Duration) -> Result<chrono::Duration, VerificationError> {
    chrono::Duration::from_std(value)
        .map_err(|e| VerificationError::Configuration(format!("Duration out of range: {e}")))
}

pub struct VerificationService {
    store: Arc<dyn TokenStore>,
    email: Arc<dyn EmailService>,
    members: Arc<dyn MembershipDirectory>,
    role_connections: Arc<dyn RoleConnectionService>,
    app_host: String,
    token_ttl: chrono::Duration,
    claim_lease: chrono::Duration,
    downstream_timeout: Duration,
    purge_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn TokenStore>,
        email: Arc<dyn EmailService>,
        members: Arc<dyn MembershipDirectory>,
        role_connections: Arc<dyn RoleConnectionService>,
        settings: VerificationSettings,
    ) -> Result<Self, VerificationError> {
        settings.validate()?;

        Ok(Self {
            store,
            email,
            members,
            role_connections,
            app_host: settings.app_host.trim_end_matches('/').to_string(),
            token_ttl: to_chrono(settings.token_ttl)?,
            claim_lease: to_chrono(settings.claim_lease)?,
            downstream_timeout: settings.downstream_timeout,
            purge_interval: settings.purge_interval,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock (tests drive expiry through this)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Link mailed to the user for `token`
    pub fn callback_url(&self, token: &str) -> String {
        format!("{}/api/email/callback?token={}", self.app_host, token)
    }

    /// Start verification of `email` on behalf of `requester_id`
    pub async fn issue(
        &self,
        email: &str,
        requester_id: &str,
    ) -> Result<IssuedVerification, VerificationError> {
        let now = self.clock.now();
        let entry = PendingVerification::new(
            email.to_string(),
            requester_id.to_string(),
            now,
            self.token_ttl,
        )?;

        let token = generate_token().map_err(|e| VerificationError::Internal(e.to_string()))?;
        self.store.insert(&token, &entry).await?;

        let callback_url = self.callback_url(&token);
        let expires_in_hours = (self.token_ttl.num_seconds().max(0) as u64).div_ceil(3600);

        let sent = self
            .bounded(
                "Verification email",
                self.email
                    .send_verification_email(&entry.email, &callback_url, expires_in_hours),
            )
            .await;

        match sent {
            Ok(receipt) => {
                tracing::info!(
                    token = %token_fingerprint(&token),
                    user_id = %requester_id,
                    message_id = %receipt.message_id,
                    provider = self.email.service_name(),
                    "Verification email sent"
                );
                Ok(IssuedVerification {
                    token,
                    callback_url,
                    expires_at: entry.expires_at,
                })
            }
            Err(err) => {
                tracing::error!(
                    token = %token_fingerprint(&token),
                    user_id = %requester_id,
                    error = %err,
                    "Verification email failed, discarding token"
                );
                if let Err(e) = self.store.delete(&token).await {
                    tracing::warn!(
                        token = %token_fingerprint(&token),
                        error = %e,
                        "Failed to discard token after email failure"
                    );
                }
                Err(err)
            }
        }
    }

    /// Redeem `token` for `caller_id` and push the resulting membership metadata
    pub async fn redeem(
        &self,
        token: &str,
        caller_id: &str,
    ) -> Result<RoleConnectionMetadata, VerificationError> {
        if token.trim().is_empty() {
            return Err(VerificationError::Validation(
                "Token is required".to_string(),
            ));
        }

        let fingerprint = token_fingerprint(token);
        let outcome = self
            .store
            .claim(token, caller_id, self.clock.now(), self.claim_lease)
            .await?;

        let entry = match outcome {
            ClaimOutcome::Claimed(entry) => entry,
            ClaimOutcome::NotFound | ClaimOutcome::Expired => {
                tracing::info!(token = %fingerprint, user_id = %caller_id, "Unknown or expired token");
                return Err(VerificationError::InvalidToken);
            }
            ClaimOutcome::IdentityMismatch => {
                tracing::warn!(token = %fingerprint, user_id = %caller_id, "Token redeemed by a different user");
                return Err(VerificationError::IdentityMismatch);
            }
            ClaimOutcome::InFlight => {
                tracing::info!(token = %fingerprint, user_id = %caller_id, "Token redemption already in progress");
                return Err(VerificationError::RedemptionInProgress);
            }
        };

        let Some(claimed_at) = entry.claimed_at else {
            return Err(VerificationError::Internal(
                "Claimed entry carries no claim timestamp".to_string(),
            ));
        };

        let metadata = match self.apply_membership(&entry, caller_id).await {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::error!(token = %fingerprint, user_id = %caller_id, error = %err, "Redemption failed, releasing claim");
                match self.store.release(token, claimed_at).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(token = %fingerprint, "Claim was no longer held at release")
                    }
                    Err(e) => tracing::warn!(token = %fingerprint, error = %e, "Failed to release claim"),
                }
                return Err(err);
            }
        };

        if !self.store.redeem(token, claimed_at).await? {
            tracing::warn!(
                token = %fingerprint,
                user_id = %caller_id,
                "Claim lapsed before redemption finished; another redemption owns the token"
            );
            return Err(VerificationError::ClaimLost);
        }

        tracing::info!(
            token = %fingerprint,
            user_id = %caller_id,
            member = metadata.member,
            "Token redeemed"
        );
        Ok(metadata)
    }

    /// Drop every expired entry; returns how many were removed
    pub async fn purge_expired(&self) -> Result<u64, VerificationError> {
        let purged = self.store.purge_expired(self.clock.now()).await?;
        if purged > 0 {
            tracing::info!(purged, "Purged expired verification tokens");
        }
        Ok(purged)
    }

    /// Sweep expired entries every purge interval until the handle is aborted.
    ///
    /// Tokens nobody redeems are otherwise only dropped when presented.
    pub fn spawn_purge_task(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.purge_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = service.purge_expired().await {
                    tracing::warn!(error = %e, "Failed to purge expired verification tokens");
                }
            }
        })
    }

    async fn apply_membership(
        &self,
        entry: &PendingVerification,
        caller_id: &str,
    ) -> Result<RoleConnectionMetadata, VerificationError> {
        let member = self
            .bounded("Membership lookup", async {
                self.members
                    .find_active_member(&entry.email)
                    .await
                    .map_err(|e| VerificationError::MembershipLookup(e.to_string()))
            })
            .await?;

        let metadata = membership_metadata(member.as_ref(), self.clock.now());

        self.bounded(
            "Role connection update",
            self.role_connections.push_metadata(caller_id, &metadata),
        )
        .await?;

        Ok(metadata)
    }

    async fn bounded<T, E>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T, E>>,
    ) -> Result<T, VerificationError>
    where
        VerificationError: From<E>,
    {
        match tokio::time::timeout(self.downstream_timeout, future).await {
            Ok(result) => result.map_err(VerificationError::from),
            Err(_) => Err(VerificationError::Timeout(operation)),
        }
    }
}
