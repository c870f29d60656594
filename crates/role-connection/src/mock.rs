//! Mock Role Connection Service Implementation
//!
//! Records pushes in memory for test assertions and can be switched into a
//! failing mode to exercise retry paths. Thread-safe via `Arc<Mutex<>>`.

use crate::{RoleConnectionError, RoleConnectionMetadata, RoleConnectionService};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A push recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPush {
    pub user_id: String,
    pub metadata: RoleConnectionMetadata,
}

/// Mock role connection service that records pushes for test assertions.
#[derive(Debug, Clone, Default)]
pub struct MockRoleConnectionService {
    pushes: Arc<Mutex<Vec<RecordedPush>>>,
    failing: Arc<AtomicBool>,
}

impl MockRoleConnectionService {
    /// Create a new mock role connection service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent push fail with a response error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Return all successful pushes in order.
    pub fn recorded_pushes(&self) -> Vec<RecordedPush> {
        self.pushes
            .lock()
            .expect("pushes lock poisoned by a panicking test")
            .clone()
    }

    /// Return the most recent metadata pushed for `user_id`.
    pub fn latest_for(&self, user_id: &str) -> Option<RoleConnectionMetadata> {
        self.recorded_pushes()
            .into_iter()
            .rev()
            .find(|push| push.user_id == user_id)
            .map(|push| push.metadata)
    }

    /// Clear all recorded pushes.
    pub fn reset(&self) {
        self.pushes
            .lock()
            .expect("pushes lock poisoned by a panicking test")
            .clear();
    }
}

#[async_trait::async_trait]
impl RoleConnectionService for MockRoleConnectionService {
    async fn push_metadata(
        &self,
        user_id: &str,
        metadata: &RoleConnectionMetadata,
    ) -> Result<(), RoleConnectionError> {
        if self.failing.load(Ordering::SeqCst) {
            tracing::debug!(user_id = %user_id, "Mock role connection: failing push");
            return Err(RoleConnectionError::Response(
                "mock role connection failure".to_string(),
            ));
        }

        tracing::debug!(user_id = %user_id, member = metadata.member, "Mock role connection: recording push");
        self.pushes
            .lock()
            .map_err(|e| RoleConnectionError::Request(format!("pushes lock poisoned: {e}")))?
            .push(RecordedPush {
                user_id: user_id.to_string(),
                metadata: metadata.clone(),
            });
        Ok(())
    }
}
