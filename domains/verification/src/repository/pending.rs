//! Postgres token store
//!
//! The claim is one conditional `UPDATE … RETURNING`; Postgres row locking
//! guarantees at most one concurrent caller sees the row come back. Release
//! and redeem match on the claim timestamp, so a redemption whose lease lapsed
//! cannot undo or finish a newer one.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use memberlink_common::RepositoryError;
use sqlx::PgPool;

use super::{ClaimOutcome, TokenStore};
use crate::domain::entities::PendingVerification;
use crate::domain::state::StateError;

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find(&self, token: &str) -> Result<Option<PendingVerification>, RepositoryError> {
        let row = sqlx::query_as::<_, PendingVerification>(
            r#"
            SELECT email, user_id, created_at, expires_at, claimed_at
            FROM pending_verifications
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(
        &self,
        token: &str,
        entry: &PendingVerification,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO pending_verifications (token, email, user_id, created_at, expires_at, claimed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(token)
        .bind(&entry.email)
        .bind(&entry.user_id)
        .bind(entry.created_at)
        .bind(entry.expires_at)
        .bind(entry.claimed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::AlreadyExists);
        }
        Ok(())
    }

    async fn get(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingVerification>, RepositoryError> {
        Ok(self.find(token).await?.filter(|entry| !entry.is_expired(now)))
    }

    async fn claim(
        &self,
        token: &str,
        caller_id: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<ClaimOutcome, RepositoryError> {
        let stale_before = now
            .checked_sub_signed(lease)
            .ok_or_else(|| RepositoryError::InvalidData("claim lease out of range".to_string()))?;

        let claimed = sqlx::query_as::<_, PendingVerification>(
            r#"
            UPDATE pending_verifications
            SET claimed_at = $3
            WHERE token = $1
              AND user_id = $2
              AND expires_at > $3
              AND (claimed_at IS NULL OR claimed_at <= $4)
            RETURNING email, user_id, created_at, expires_at, claimed_at
            "#,
        )
        .bind(token)
        .bind(caller_id)
        .bind(now)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(entry) = claimed {
            return Ok(ClaimOutcome::Claimed(entry));
        }

        // Nothing updated: classify why using the same rules as the entity
        let Some(mut entry) = self.find(token).await? else {
            return Ok(ClaimOutcome::NotFound);
        };

        match entry.claim(caller_id, now, lease) {
            Err(StateError::IdentityMismatch) => Ok(ClaimOutcome::IdentityMismatch),
            Err(StateError::AlreadyClaimed) => Ok(ClaimOutcome::InFlight),
            Err(StateError::TerminalState(_)) | Err(StateError::InvalidTransition { .. }) => {
                self.delete(token).await?;
                Ok(ClaimOutcome::Expired)
            }
            // The row changed between the two statements (released or
            // re-claimed); report it as busy rather than retrying.
            Ok(()) => Ok(ClaimOutcome::InFlight),
        }
    }

    async fn release(
        &self,
        token: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let Some(mut entry) = self.find(token).await? else {
            return Ok(false);
        };
        if entry.release(claimed_at).is_err() {
            return Ok(false);
        }

        // Only clears the marker if the claim was not taken over meanwhile
        let result = sqlx::query(
            r#"
            UPDATE pending_verifications
            SET claimed_at = NULL
            WHERE token = $1 AND claimed_at = $2
            "#,
        )
        .bind(token)
        .bind(claimed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn redeem(
        &self,
        token: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let Some(entry) = self.find(token).await? else {
            return Ok(false);
        };
        if entry.redeem(claimed_at).is_err() {
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM pending_verifications
            WHERE token = $1 AND claimed_at = $2
            "#,
        )
        .bind(token)
        .bind(claimed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, token: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM pending_verifications WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM pending_verifications WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
