//! State machine for pending verification tokens
//!
//! Each token moves through:
//! - `Issued`: stored, waiting for the owner to follow the link
//! - `Claimed`: a redemption is in flight (downstream calls running)
//! - `Redeemed`: metadata pushed, entry deleted (terminal)
//! - `Expired`: validity window elapsed (terminal)
//!
//! A failed downstream call releases the claim, returning the token to
//! `Issued` so the owner can retry. Nothing leaves `Redeemed`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during state transitions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Invalid transition: cannot apply {event} in state {from}")]
    InvalidTransition { from: String, event: String },

    #[error("Terminal state: {0} is a terminal state and cannot transition")]
    TerminalState(String),

    #[error("Token is bound to a different identity")]
    IdentityMismatch,

    #[error("Token is already being redeemed")]
    AlreadyClaimed,
}

/// Token lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    Issued,
    Claimed,
    Redeemed,
    Expired,
}

impl TokenState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Redeemed | Self::Expired)
    }
}

impl std::fmt::Display for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issued => write!(f, "issued"),
            Self::Claimed => write!(f, "claimed"),
            Self::Redeemed => write!(f, "redeemed"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Events that trigger token state transitions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenEvent {
    /// Owner starts a redemption
    Claim,
    /// Downstream call failed; hand the token back
    Release,
    /// Metadata pushed; the claim holder removes the entry
    Redeem,
}

impl std::fmt::Display for TokenEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Claim => write!(f, "claim"),
            Self::Release => write!(f, "release"),
            Self::Redeem => write!(f, "redeem"),
        }
    }
}

/// Guard context for token transitions
#[derive(Debug, Clone)]
pub struct TokenGuardContext {
    /// Whether the caller is the identity that requested the token
    pub caller_is_owner: bool,
}

/// Token state machine
pub struct TokenStateMachine;

impl TokenStateMachine {
    /// Attempt a state transition with guard conditions
    pub fn transition(
        current: TokenState,
        event: TokenEvent,
        context: Option<&TokenGuardContext>,
    ) -> Result<TokenState, StateError> {
        if current.is_terminal() {
            return Err(StateError::TerminalState(current.to_string()));
        }

        let caller_is_owner = context.map(|ctx| ctx.caller_is_owner).unwrap_or(true);

        let next = match (current, event) {
            (TokenState::Issued, TokenEvent::Claim) => {
                if !caller_is_owner {
                    return Err(StateError::IdentityMismatch);
                }
                TokenState::Claimed
            }
            (TokenState::Claimed, TokenEvent::Claim) => {
                if !caller_is_owner {
                    return Err(StateError::IdentityMismatch);
                }
                return Err(StateError::AlreadyClaimed);
            }
            (TokenState::Claimed, TokenEvent::Release) => TokenState::Issued,
            (TokenState::Claimed, TokenEvent::Redeem) => TokenState::Redeemed,

            _ => {
                return Err(StateError::InvalidTransition {
                    from: current.to_string(),
                    event: event.to_string(),
                });
            }
        };

        Ok(next)
    }
}
