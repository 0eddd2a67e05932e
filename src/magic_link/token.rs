//! Opaque single-use token minting
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, TryRngCore};
use std::sync::Arc;

use crate::models::AuthError;
use crate::utils::clock::Clock;

/// 256 bits
pub const MIN_TOKEN_BYTES: usize = 32;

/// A freshly minted token value and the instant it stops being usable
#[derive(Clone)]
pub struct GeneratedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for GeneratedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Draws token values from the OS CSPRNG and stamps them with a fixed TTL
#[derive(Clone)]
pub struct TokenGenerator {
    byte_length: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenGenerator {
    /// `byte_length` is clamped up to [`MIN_TOKEN_BYTES`].
    #[must_use]
    pub fn new(byte_length: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            byte_length: byte_length.max(MIN_TOKEN_BYTES),
            ttl,
            clock,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a base64url (unpadded) token.
    ///
    /// # Errors
    ///
    /// Returns `TokenGeneration` if the OS entropy source fails or the expiry
    /// falls outside the representable range.
    pub fn generate(&self) -> Result<GeneratedToken, AuthError> {
        let mut bytes = vec![0u8; self.byte_length];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;

        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::TokenGeneration("token expiry out of range".to_string()))?;

        Ok(GeneratedToken {
            value: URL_SAFE_NO_PAD.encode(&bytes),
            expires_at,
        })
    }
}

impl std::fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("byte_length", &self.byte_length)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
