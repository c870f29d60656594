//! Domain entities for the verification domain
//!
//! A `PendingVerification` is the value stored under a token between issuance
//! and redemption. Its lifecycle is driven by [`TokenStateMachine`]; the
//! store only persists the timestamps the machine reads.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::domain::state::{
    StateError, TokenEvent, TokenGuardContext, TokenState, TokenStateMachine,
};
use crate::error::VerificationError;

pub use memberlink_role_connection::RoleConnectionMetadata;

/// Pending verification entry, keyed by its token in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingVerification {
    pub email: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl PendingVerification {
    /// Create a new entry for `email`, bound to `user_id`
    pub fn new(
        email: String,
        user_id: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, VerificationError> {
        validate_email(&email)?;

        if user_id.trim().is_empty() {
            return Err(VerificationError::Validation(
                "Requester id cannot be empty".to_string(),
            ));
        }

        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            VerificationError::Configuration("Token TTL is out of range".to_string())
        })?;

        Ok(Self {
            email,
            user_id,
            created_at: now,
            expires_at,
            claimed_at: None,
        })
    }

    /// Whether the validity window has elapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether a claim is live at `now`. Claims older than `lease` are stale.
    pub fn is_claimed(&self, now: DateTime<Utc>, lease: Duration) -> bool {
        self.claimed_at
            .map(|claimed_at| {
                claimed_at
                    .checked_add_signed(lease)
                    .map_or(true, |lapses_at| lapses_at > now)
            })
            .unwrap_or(false)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Current lifecycle state as observed at `now`
    pub fn state(&self, now: DateTime<Utc>, lease: Duration) -> TokenState {
        if self.is_claimed(now, lease) {
            TokenState::Claimed
        } else if self.is_expired(now) {
            TokenState::Expired
        } else {
            TokenState::Issued
        }
    }

    /// Mark the entry as being redeemed by `caller_id`
    pub fn claim(
        &mut self,
        caller_id: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<(), StateError> {
        let context = TokenGuardContext {
            caller_is_owner: self.is_owned_by(caller_id),
        };
        TokenStateMachine::transition(self.state(now, lease), TokenEvent::Claim, Some(&context))?;
        self.claimed_at = Some(now);
        Ok(())
    }

    /// State as seen by the redeemer whose claim was taken at `claimed_at`.
    /// A claim that has since been released or taken over is no longer held.
    fn held_state(&self, claimed_at: DateTime<Utc>) -> TokenState {
        if self.claimed_at == Some(claimed_at) {
            TokenState::Claimed
        } else {
            TokenState::Issued
        }
    }

    /// Hand the claim taken at `claimed_at` back so the token can be redeemed again
    pub fn release(&mut self, claimed_at: DateTime<Utc>) -> Result<(), StateError> {
        TokenStateMachine::transition(self.held_state(claimed_at), TokenEvent::Release, None)?;
        self.claimed_at = None;
        Ok(())
    }

    /// Check that the claim taken at `claimed_at` may finish the redemption.
    /// The caller removes the entry once this succeeds.
    pub fn redeem(&self, claimed_at: DateTime<Utc>) -> Result<TokenState, StateError> {
        TokenStateMachine::transition(self.held_state(claimed_at), TokenEvent::Redeem, None)
    }
}

/// Result of a successful issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedVerification {
    /// The token is never returned over HTTP, only mailed
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(skip_serializing)]
    pub callback_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Active membership as reported by the membership directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// ISO-8601 end of the membership, passed through verbatim
    pub end_date: String,
}

impl MemberRecord {
    pub fn new(end_date: impl Into<String>) -> Self {
        Self {
            end_date: end_date.into(),
        }
    }
}

/// Metadata to push for a lookup result. Non-members get an expiry one day in
/// the past so the linked role is treated as lapsed.
pub fn membership_metadata(
    member: Option<&MemberRecord>,
    now: DateTime<Utc>,
) -> RoleConnectionMetadata {
    match member {
        Some(record) => RoleConnectionMetadata::member(record.end_date.clone()),
        None => RoleConnectionMetadata::non_member(
            (now - Duration::days(1)).to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    }
}

/// Syntactic email check (RFC 5321, including length limits)
pub fn validate_email(email: &str) -> Result<(), VerificationError> {
    if email.trim().is_empty() {
        return Err(VerificationError::Validation(
            "Email is required".to_string(),
        ));
    }
    if !email.validate_email() {
        return Err(VerificationError::Validation(
            "Invalid email format".to_string(),
        ));
    }
    Ok(())
}
