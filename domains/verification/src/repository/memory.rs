//! In-memory token store and membership directory
//!
//! Used by the `memory` store setting and by tests. The claim runs inside a
//! single mutex section, so it is atomic per process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use memberlink_common::RepositoryError;

use super::{ClaimOutcome, MembershipDirectory, TokenStore};
use crate::domain::entities::{MemberRecord, PendingVerification};
use crate::domain::state::StateError;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|e| RepositoryError::InvalidData(format!("store lock poisoned: {e}")))
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenStore {
    entries: Arc<Mutex<HashMap<String, PendingVerification>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw entry lookup ignoring expiry, for assertions
    pub fn peek(&self, token: &str) -> Option<PendingVerification> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(token).cloned())
    }

    /// Every stored token, in no particular order
    pub fn tokens(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn insert(
        &self,
        token: &str,
        entry: &PendingVerification,
    ) -> Result<(), RepositoryError> {
        let mut entries = lock(&self.entries)?;
        if entries.contains_key(token) {
            return Err(RepositoryError::AlreadyExists);
        }
        entries.insert(token.to_string(), entry.clone());
        Ok(())
    }

    async fn get(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingVerification>, RepositoryError> {
        let mut entries = lock(&self.entries)?;
        match entries.get(token) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(token);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.clone())),
            None => Ok(None),
        }
    }

    async fn claim(
        &self,
        token: &str,
        caller_id: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<ClaimOutcome, RepositoryError> {
        let mut entries = lock(&self.entries)?;
        let Some(entry) = entries.get_mut(token) else {
            return Ok(ClaimOutcome::NotFound);
        };

        match entry.claim(caller_id, now, lease) {
            Ok(()) => Ok(ClaimOutcome::Claimed(entry.clone())),
            Err(StateError::IdentityMismatch) => Ok(ClaimOutcome::IdentityMismatch),
            Err(StateError::AlreadyClaimed) => Ok(ClaimOutcome::InFlight),
            Err(StateError::TerminalState(_)) | Err(StateError::InvalidTransition { .. }) => {
                entries.remove(token);
                Ok(ClaimOutcome::Expired)
            }
        }
    }

    async fn release(
        &self,
        token: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut entries = lock(&self.entries)?;
        Ok(entries
            .get_mut(token)
            .is_some_and(|entry| entry.release(claimed_at).is_ok()))
    }

    async fn redeem(
        &self,
        token: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut entries = lock(&self.entries)?;
        let held = entries
            .get(token)
            .is_some_and(|entry| entry.redeem(claimed_at).is_ok());
        if held {
            entries.remove(token);
        }
        Ok(held)
    }

    async fn delete(&self, token: &str) -> Result<bool, RepositoryError> {
        Ok(lock(&self.entries)?.remove(token).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut entries = lock(&self.entries)?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}

/// Membership directory backed by a map of lowercase email to record
#[derive(Debug, Clone, Default)]
pub struct InMemoryMembershipDirectory {
    members: Arc<Mutex<HashMap<String, MemberRecord>>>,
}

impl InMemoryMembershipDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an active member
    pub fn add_member(&self, email: &str, end_date: impl Into<String>) {
        if let Ok(mut members) = self.members.lock() {
            members.insert(email.to_lowercase(), MemberRecord::new(end_date));
        }
    }

    pub fn remove_member(&self, email: &str) {
        if let Ok(mut members) = self.members.lock() {
            members.remove(&email.to_lowercase());
        }
    }
}

#[async_trait]
impl MembershipDirectory for InMemoryMembershipDirectory {
    async fn find_active_member(
        &self,
        email: &str,
    ) -> Result<Option<MemberRecord>, RepositoryError> {
        Ok(lock(&self.members)?.get(&email.to_lowercase()).cloned())
    }
}
