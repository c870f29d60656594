//! Identity of an authenticated caller

use crate::claims::SessionClaims;

/// Represents an authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Discord user ID; the identity verification tokens are bound to
    pub user_id: String,
    pub username: Option<String>,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
        }
    }

    pub(crate) fn from_claims(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
        }
    }

    /// Whether this caller is the given identity
    pub fn is(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
