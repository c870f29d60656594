//! Membership directory

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use memberlink_common::RepositoryError;
use sqlx::PgPool;

use crate::domain::entities::MemberRecord;

/// Answers whether an email belongs to an active member
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn find_active_member(
        &self,
        email: &str,
    ) -> Result<Option<MemberRecord>, RepositoryError>;
}

/// Directory reading the `members` table maintained by the membership system
#[derive(Clone)]
pub struct PgMembershipDirectory {
    pool: PgPool,
}

impl PgMembershipDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipDirectory for PgMembershipDirectory {
    async fn find_active_member(
        &self,
        email: &str,
    ) -> Result<Option<MemberRecord>, RepositoryError> {
        let end_date: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT end_date
            FROM members
            WHERE lower(email) = lower($1)
              AND end_date > NOW()
            ORDER BY end_date DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(end_date.map(|end_date| {
            MemberRecord::new(end_date.to_rfc3339_opts(SecondsFormat::Millis, true))
        }))
    }
}
