//! Verification domain errors

use memberlink_common::{Error, RepositoryError};
use memberlink_email::EmailError;
use memberlink_role_connection::RoleConnectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Verification configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("User ID does not match the token")]
    IdentityMismatch,

    #[error("Token is already being redeemed")]
    RedemptionInProgress,

    #[error("Redemption lease lapsed and the token was claimed again")]
    ClaimLost,

    #[error("Failed to send verification email: {0}")]
    Mail(#[from] EmailError),

    #[error("Membership lookup failed: {0}")]
    MembershipLookup(String),

    #[error("Role connection update failed: {0}")]
    RoleConnection(#[from] RoleConnectionError),

    #[error("Token store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<VerificationError> for Error {
    fn from(err: VerificationError) -> Self {
        let message = err.to_string();
        match err {
            VerificationError::Configuration(_) => Error::Configuration(message),
            VerificationError::Validation(msg) => Error::Validation(msg),
            VerificationError::InvalidToken => Error::InvalidToken(message),
            VerificationError::IdentityMismatch => Error::IdentityMismatch(message),
            VerificationError::RedemptionInProgress | VerificationError::ClaimLost => {
                Error::Conflict(message)
            }
            VerificationError::Mail(_)
            | VerificationError::MembershipLookup(_)
            | VerificationError::RoleConnection(_)
            | VerificationError::Timeout(_) => Error::Upstream(message),
            VerificationError::Store(e) => e.into(),
            VerificationError::Internal(msg) => Error::Internal(msg),
        }
    }
}
