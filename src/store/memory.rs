//! Process-local storage backend.
//!
//! Suitable for single-instance deployments and tests. All tables live behind
//! one lock so the unique constraints, the foreign key and the consume
//! compare-and-set behave like their relational counterparts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{CandidateStore, StoreError, TokenStore};
use crate::validation::phone_key;
use crate::models::{
    AuthToken, Candidate, CandidateId, ConsumeOutcome, NewAuthToken, NewCandidate, TokenId,
    TokenPurpose,
};

#[derive(Debug, Default)]
struct Tables {
    candidates: HashMap<CandidateId, Candidate>,
    /// Keyed by [`phone_key`], not the display form
    phone_index: HashMap<String, CandidateId>,
    email_index: HashMap<String, CandidateId>,
    tokens: HashMap<TokenId, AuthToken>,
    token_index: HashMap<String, TokenId>,
}

impl Tables {
    fn insert_token(&mut self, new: NewAuthToken) -> Result<TokenId, StoreError> {
        if !self.candidates.contains_key(&new.candidate_id) {
            return Err(StoreError::NotFound);
        }
        if self.token_index.contains_key(&new.token) {
            return Err(StoreError::DuplicateToken);
        }

        let id = TokenId::new();
        self.token_index.insert(new.token.clone(), id);
        self.tokens.insert(
            id,
            AuthToken {
                id,
                candidate_id: new.candidate_id,
                token: new.token,
                purpose: new.purpose,
                expires_at: new.expires_at,
                consumed: false,
                consumed_at: None,
                metadata: new.metadata,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn invalidate_unconsumed(&mut self, candidate_id: CandidateId, purpose: TokenPurpose) -> u64 {
        let stale: Vec<TokenId> = self
            .tokens
            .values()
            .filter(|t| t.candidate_id == candidate_id && t.purpose == purpose && !t.consumed)
            .map(|t| t.id)
            .collect();

        for id in &stale {
            if let Some(token) = self.tokens.remove(id) {
                self.token_index.remove(&token.token);
            }
        }
        stale.len() as u64
    }
}

/// In-memory implementation of both store traits
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of token rows currently held
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn token_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.tokens.len())
    }

    /// Number of candidate rows currently held
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn candidate_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.candidates.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn find_candidate_by_id(&self, id: CandidateId) -> Result<Option<Candidate>, StoreError> {
        Ok(self.read()?.candidates.get(&id).cloned())
    }

    async fn find_candidate_by_phone(&self, phone: &str) -> Result<Option<Candidate>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .phone_index
            .get(&phone_key(phone))
            .and_then(|id| tables.candidates.get(id))
            .cloned())
    }

    async fn find_candidate_by_email(&self, email: &str) -> Result<Option<Candidate>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .email_index
            .get(email)
            .and_then(|id| tables.candidates.get(id))
            .cloned())
    }

    async fn insert_candidate(&self, new: NewCandidate) -> Result<Candidate, StoreError> {
        let mut tables = self.write()?;

        let key = phone_key(&new.phone);
        if tables.phone_index.contains_key(&key) {
            return Err(StoreError::AlreadyExists);
        }
        if let Some(email) = &new.email {
            if tables.email_index.contains_key(email) {
                return Err(StoreError::AlreadyExists);
            }
        }

        let now = Utc::now();
        let candidate = Candidate {
            id: CandidateId::new(),
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            email: new.email,
            password_hash: new.password_hash,
            is_active: new.is_active,
            experience_level: None,
            confidence_score: None,
            created_at: now,
            updated_at: now,
        };

        tables.phone_index.insert(key, candidate.id);
        if let Some(email) = &candidate.email {
            tables.email_index.insert(email.clone(), candidate.id);
        }
        tables.candidates.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn set_candidate_active(
        &self,
        id: CandidateId,
        active: bool,
    ) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        Ok(match tables.candidates.get_mut(&id) {
            Some(candidate) => {
                candidate.is_active = active;
                candidate.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn invalidate_unconsumed(
        &self,
        candidate_id: CandidateId,
        purpose: TokenPurpose,
    ) -> Result<u64, StoreError> {
        Ok(self.write()?.invalidate_unconsumed(candidate_id, purpose))
    }

    async fn insert_token(&self, token: NewAuthToken) -> Result<TokenId, StoreError> {
        self.write()?.insert_token(token)
    }

    async fn find_token_by_value(&self, value: &str) -> Result<Option<AuthToken>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .token_index
            .get(value)
            .and_then(|id| tables.tokens.get(id))
            .cloned())
    }

    async fn mark_consumed(
        &self,
        id: TokenId,
        consumed_at: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut tables = self.write()?;
        Ok(match tables.tokens.get_mut(&id) {
            None => ConsumeOutcome::NotFound,
            Some(token) if token.consumed => ConsumeOutcome::AlreadyConsumed,
            Some(token) => {
                token.consumed = true;
                token.consumed_at = Some(consumed_at);
                ConsumeOutcome::Consumed
            }
        })
    }

    async fn issue(&self, token: NewAuthToken) -> Result<TokenId, StoreError> {
        let mut tables = self.write()?;
        if !tables.candidates.contains_key(&token.candidate_id) {
            return Err(StoreError::NotFound);
        }
        tables.invalidate_unconsumed(token.candidate_id, token.purpose);
        tables.insert_token(token)
    }
}
