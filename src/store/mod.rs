//! Storage abstraction for candidates and auth tokens.
//!
//! Backends implement [`CandidateStore`] and [`TokenStore`] so the directory,
//! issuer and verifier never depend on a specific database engine. Every
//! backend must provide:
//!
//! - unique phone (compared by [`phone_key`](crate::validation::phone_key)),
//!   unique email and unique token value constraints,
//! - a token → candidate foreign key,
//! - an atomic compare-and-set on the token `consumed` flag.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    AuthToken, Candidate, CandidateId, ConsumeOutcome, NewAuthToken, NewCandidate, TokenId,
    TokenPurpose,
};

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique contact constraint (phone or email) rejected the insert
    #[error("already exists")]
    AlreadyExists,
    /// The random token value collided with an existing row
    #[error("duplicate token value")]
    DuplicateToken,
    /// A referenced row is missing (foreign key)
    #[error("not found")]
    NotFound,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Candidate rows
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn find_candidate_by_id(&self, id: CandidateId) -> Result<Option<Candidate>, StoreError>;

    /// Matches on the canonical phone key, so any formatting of the number finds the row
    async fn find_candidate_by_phone(&self, phone: &str) -> Result<Option<Candidate>, StoreError>;

    /// `email` is expected in canonical (lower-cased) form
    async fn find_candidate_by_email(&self, email: &str) -> Result<Option<Candidate>, StoreError>;

    /// Insert a candidate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when the phone or email is taken.
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate, StoreError>;

    /// Flip the active flag. Returns `false` when no such candidate exists.
    async fn set_candidate_active(
        &self,
        id: CandidateId,
        active: bool,
    ) -> Result<bool, StoreError>;

    /// Cheap round-trip used by the readiness probe
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Auth token rows
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Retire every unconsumed token of `purpose` held by `candidate_id`.
    /// Returns the number of rows removed.
    async fn invalidate_unconsumed(
        &self,
        candidate_id: CandidateId,
        purpose: TokenPurpose,
    ) -> Result<u64, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateToken`] if the token value collides and
    /// [`StoreError::NotFound`] if the candidate does not exist.
    async fn insert_token(&self, token: NewAuthToken) -> Result<TokenId, StoreError>;

    async fn find_token_by_value(&self, value: &str) -> Result<Option<AuthToken>, StoreError>;

    /// Compare-and-set `consumed: false → true`. This is the linearization
    /// point for "first verifier wins".
    async fn mark_consumed(
        &self,
        id: TokenId,
        consumed_at: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError>;

    /// Invalidate siblings then insert. Backends that support it override this
    /// to run both steps atomically; the default runs them in sequence.
    async fn issue(&self, token: NewAuthToken) -> Result<TokenId, StoreError> {
        self.invalidate_unconsumed(token.candidate_id, token.purpose)
            .await?;
        self.insert_token(token).await
    }
}
