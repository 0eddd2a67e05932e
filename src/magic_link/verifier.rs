//! Token verification state machine
//!
//! `Presented → {Valid, Invalid, Expired, AlreadyUsed}`. Only `Valid` writes:
//! it flips the token to consumed through the store's compare-and-set, which
//! is what decides the winner when the same token is presented concurrently.

use log::{error, info};
use std::sync::Arc;

use crate::directory::CandidateDirectory;
use crate::models::{AuthError, ConsumeOutcome, VerificationOutcome};
use crate::store::TokenStore;
use crate::utils::clock::Clock;
use crate::validation::is_well_formed_token;

pub struct TokenVerifier {
    directory: CandidateDirectory,
    tokens: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(
        directory: CandidateDirectory,
        tokens: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            tokens,
            clock,
        }
    }

    /// Check a presented token and consume it if it is still good.
    ///
    /// # Errors
    ///
    /// `Store` for storage faults, `CorruptToken` when a consumed token points
    /// at a candidate that no longer exists. Rejections are `Ok` outcomes.
    pub async fn verify(&self, presented: &str) -> Result<VerificationOutcome, AuthError> {
        let presented = presented.trim();
        if !is_well_formed_token(presented) {
            return Ok(VerificationOutcome::Invalid);
        }

        let Some(token) = self.tokens.find_token_by_value(presented).await? else {
            info!("Verification rejected: unknown token");
            return Ok(VerificationOutcome::Invalid);
        };

        if token.consumed {
            info!("Verification rejected: token {} already used", token.id);
            return Ok(VerificationOutcome::AlreadyUsed);
        }

        let now = self.clock.now();
        if token.is_expired_at(now) {
            info!("Verification rejected: token {} expired", token.id);
            return Ok(VerificationOutcome::Expired);
        }

        match self.tokens.mark_consumed(token.id, now).await? {
            ConsumeOutcome::Consumed => {}
            ConsumeOutcome::AlreadyConsumed => {
                info!("Verification rejected: token {} consumed concurrently", token.id);
                return Ok(VerificationOutcome::AlreadyUsed);
            }
            // Retired by a newer issuance between lookup and consume
            ConsumeOutcome::NotFound => return Ok(VerificationOutcome::Invalid),
        }

        match self.directory.find_by_id(token.candidate_id).await? {
            Some(candidate) => {
                info!(
                    "✅ Token {} verified for candidate {}",
                    token.id, candidate.id
                );
                Ok(VerificationOutcome::Valid(candidate))
            }
            None => {
                error!(
                    "🚨 Data integrity fault: token {} references missing candidate {}",
                    token.id, token.candidate_id
                );
                Err(AuthError::CorruptToken {
                    token_id: token.id,
                    candidate_id: token.candidate_id,
                })
            }
        }
    }
}
