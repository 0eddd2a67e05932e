//! Candidate lookup and provisioning on top of a [`CandidateStore`]
use log::{debug, info};
use std::sync::Arc;

use crate::models::{AuthError, Candidate, CandidateId, NewCandidate};
use crate::store::{CandidateStore, StoreError};
use crate::validation::ContactIdentifier;

#[derive(Clone)]
pub struct CandidateDirectory {
    store: Arc<dyn CandidateStore>,
}

impl CandidateDirectory {
    #[must_use]
    pub fn new(store: Arc<dyn CandidateStore>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn find_by_contact(
        &self,
        contact: &ContactIdentifier,
    ) -> Result<Option<Candidate>, StoreError> {
        match contact {
            ContactIdentifier::Phone(phone) => self.store.find_candidate_by_phone(phone).await,
            ContactIdentifier::Email(email) => self.store.find_candidate_by_email(email).await,
        }
    }

    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn find_by_id(&self, id: CandidateId) -> Result<Option<Candidate>, StoreError> {
        self.store.find_candidate_by_id(id).await
    }

    /// Create a minimal candidate for an unknown phone number.
    ///
    /// Concurrent calls for the same number converge on one row: the loser of
    /// the insert race re-reads the winner's record.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for email identifiers (a placeholder needs a phone),
    /// otherwise storage failures.
    pub async fn create_placeholder(
        &self,
        contact: &ContactIdentifier,
    ) -> Result<Candidate, AuthError> {
        let ContactIdentifier::Phone(phone) = contact else {
            return Err(AuthError::InvalidRequest(
                "A phone number is required to create an account".to_string(),
            ));
        };

        match self.store.insert_candidate(NewCandidate::placeholder(phone)).await {
            Ok(candidate) => {
                info!("👤 Provisioned placeholder candidate {}", candidate.id);
                Ok(candidate)
            }
            Err(StoreError::AlreadyExists) => {
                debug!("Placeholder insert for {contact} lost a race, re-fetching");
                self.store
                    .find_candidate_by_phone(phone)
                    .await?
                    .ok_or(AuthError::Store(StoreError::NotFound))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a candidate, provisioning a placeholder when `auto_provision` allows
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn resolve(
        &self,
        contact: &ContactIdentifier,
        auto_provision: bool,
    ) -> Result<Option<Candidate>, AuthError> {
        if let Some(candidate) = self.find_by_contact(contact).await? {
            return Ok(Some(candidate));
        }
        if auto_provision && matches!(contact, ContactIdentifier::Phone(_)) {
            return self.create_placeholder(contact).await.map(Some);
        }
        Ok(None)
    }

    /// Insert a fully specified candidate (self-signup).
    ///
    /// # Errors
    ///
    /// `DuplicateContact` when the phone or email is already registered.
    pub async fn register(&self, candidate: NewCandidate) -> Result<Candidate, AuthError> {
        match self.store.insert_candidate(candidate).await {
            Ok(candidate) => Ok(candidate),
            Err(StoreError::AlreadyExists) => Err(AuthError::DuplicateContact),
            Err(e) => Err(e.into()),
        }
    }

    /// Deactivate or reactivate a candidate. Records are never deleted.
    ///
    /// # Errors
    ///
    /// `Store(NotFound)` when no such candidate exists.
    pub async fn set_active(&self, id: CandidateId, active: bool) -> Result<(), AuthError> {
        if self.store.set_candidate_active(id, active).await? {
            info!("Candidate {id} active={active}");
            Ok(())
        } else {
            Err(AuthError::Store(StoreError::NotFound))
        }
    }

    /// # Errors
    ///
    /// Propagates the store's health probe failure.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}
