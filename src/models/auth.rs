//! Common authentication error and outcome types
//!
//! Both the magic-link pipeline and the password flow report failures through
//! [`AuthError`]. Expected token rejections are not errors; they come back as
//! [`VerificationOutcome`] values.

use thiserror::Error;

use super::{Candidate, CandidateId, TokenId};
use crate::store::StoreError;

/// Service-level authentication failures
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input (400-class)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown identifier or wrong password; deliberately indistinguishable
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Credentials were correct but the account is deactivated
    #[error("account is disabled")]
    Disabled,

    /// Signup collided with an existing phone or email
    #[error("a candidate with this contact already exists")]
    DuplicateContact,

    /// Storage fault, safe to retry
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A consumed token references a candidate that does not exist
    #[error("token {token_id} references missing candidate {candidate_id}")]
    CorruptToken {
        token_id: TokenId,
        candidate_id: CandidateId,
    },

    /// The entropy source failed while minting a token
    #[error("token generation failed: {0}")]
    TokenGeneration(String),

    /// The password hashing primitive failed
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl AuthError {
    /// Whether a client may reasonably retry the same request
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Store(_))
    }
}

/// Terminal states of the token verification state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Token was consumed by this call; carries the owning candidate
    Valid(Candidate),
    /// No token with this value exists
    Invalid,
    /// Token exists but its expiry has passed
    Expired,
    /// Token was consumed earlier, or by a concurrent verification
    AlreadyUsed,
}

impl VerificationOutcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            VerificationOutcome::Valid(_) => "valid",
            VerificationOutcome::Invalid => "invalid",
            VerificationOutcome::Expired => "expired",
            VerificationOutcome::AlreadyUsed => "already_used",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_errors_are_retryable() {
        assert!(AuthError::Store(StoreError::Backend("down".to_string())).is_retryable());
        assert!(!AuthError::InvalidCredentials.is_retryable());
        assert!(!AuthError::CorruptToken {
            token_id: TokenId::new(),
            candidate_id: CandidateId::new(),
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::Disabled.to_string(), "account is disabled");
        assert_eq!(
            AuthError::InvalidRequest("Phone number is required".to_string()).to_string(),
            "invalid request: Phone number is required"
        );
    }
}
