//! Storage for the verification domain
//!
//! Two capabilities live here: the token store holding pending entries, and
//! the membership directory answering "is this email an active member".
//! Each has an in-memory implementation and a Postgres one.

pub mod members;
pub mod memory;
pub mod pending;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use memberlink_common::RepositoryError;

use crate::domain::entities::PendingVerification;

pub use members::{MembershipDirectory, PgMembershipDirectory};
pub use memory::{InMemoryMembershipDirectory, InMemoryTokenStore};
pub use pending::PgTokenStore;

/// Migrations for the Postgres token store
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Outcome of an atomic claim attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller now holds the entry; downstream calls may proceed
    Claimed(PendingVerification),
    NotFound,
    /// The entry existed but its validity window elapsed; it has been purged
    Expired,
    /// The entry is bound to another identity and was left untouched
    IdentityMismatch,
    /// Another redemption holds a live claim on the entry
    InFlight,
}

/// Keyed store of pending verifications
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store a new entry; fails with `AlreadyExists` on a token collision
    async fn insert(
        &self,
        token: &str,
        entry: &PendingVerification,
    ) -> Result<(), RepositoryError>;

    /// Fetch an unexpired entry
    async fn get(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingVerification>, RepositoryError>;

    /// Atomically mark the entry as being redeemed by `caller_id`.
    ///
    /// Of any number of concurrent callers at most one observes `Claimed`
    /// until the claim is released, deleted, or older than `lease`.
    async fn claim(
        &self,
        token: &str,
        caller_id: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<ClaimOutcome, RepositoryError>;

    /// Hand back the claim taken at `claimed_at` so the token can be
    /// redeemed again. Returns `false` when that claim is no longer held.
    async fn release(
        &self,
        token: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Remove the entry on behalf of the claim taken at `claimed_at`.
    ///
    /// Returns `false`, leaving the entry alone, when that claim has been
    /// released or taken over since.
    async fn redeem(
        &self,
        token: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Remove the entry regardless of claims; returns whether it existed
    async fn delete(&self, token: &str) -> Result<bool, RepositoryError>;

    /// Remove every entry expired at `now`; returns how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}
