//! Password-based candidate signup and login
//!
//! Login always performs exactly one bcrypt comparison, against a throwaway
//! hash when the identifier is unknown or has no password, so response timing
//! does not reveal which identifiers exist. The throwaway hash is computed at
//! construction, never on the first unknown login. The disabled check only
//! happens after the password has been confirmed.

use log::{info, warn};

use crate::directory::CandidateDirectory;
use crate::models::{AuthError, Candidate, NewCandidate};
use crate::validation::{required_field, ContactIdentifier};

/// bcrypt only looks at the first 72 bytes of input
pub const MAX_PASSWORD_BYTES: usize = 72;

const DUMMY_PASSWORD: &str = "pocketsend-timing-equaliser";

/// Signup fields as submitted by the candidate
#[derive(Clone, Default)]
pub struct CandidateRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

impl std::fmt::Debug for CandidateRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateRegistration")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

pub struct PasswordAuthenticator {
    directory: CandidateDirectory,
    cost: u32,
    min_length: usize,
    dummy_hash: String,
}

impl PasswordAuthenticator {
    /// Hashes the throwaway password up front at `cost`, so this blocks for
    /// one bcrypt round.
    ///
    /// # Errors
    ///
    /// `Hashing` when bcrypt refuses `cost`.
    pub fn new(
        directory: CandidateDirectory,
        cost: u32,
        min_length: usize,
    ) -> Result<Self, AuthError> {
        let dummy_hash =
            bcrypt::hash(DUMMY_PASSWORD, cost).map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(Self {
            directory,
            cost,
            min_length,
            dummy_hash,
        })
    }

    /// Create an active candidate with a bcrypt-hashed password.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for missing or malformed fields, `DuplicateContact`
    /// when the phone or email is already registered.
    pub async fn register(&self, registration: CandidateRegistration) -> Result<Candidate, AuthError> {
        let first_name = required_field(Some(registration.first_name.as_str()), "First name")?;
        let last_name = required_field(Some(registration.last_name.as_str()), "Last name")?;
        let email = ContactIdentifier::email(&registration.email)?.into_inner();
        let phone = ContactIdentifier::phone(&registration.phone)?.into_inner();
        self.check_password_policy(&registration.password)?;

        let password_hash = self.hash(registration.password).await?;
        let candidate = self
            .directory
            .register(NewCandidate {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                phone,
                email: Some(email),
                password_hash: Some(password_hash),
                is_active: true,
            })
            .await?;

        info!("👤 Candidate {} registered with password", candidate.id);
        Ok(candidate)
    }

    /// Check an identifier/password pair.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown identifier, a wrong password or one
    /// longer than [`MAX_PASSWORD_BYTES`], `Disabled` for a deactivated account
    /// whose password was correct.
    pub async fn authenticate(
        &self,
        identifier: &ContactIdentifier,
        password: &str,
    ) -> Result<Candidate, AuthError> {
        let candidate = self.directory.find_by_contact(identifier).await?;

        let stored_hash = match candidate.as_ref().and_then(|c| c.password_hash.clone()) {
            Some(hash) => hash,
            None => self.dummy_hash.clone(),
        };
        // bcrypt ignores bytes past the limit, so a longer input could match
        // a stored prefix. Still compare once to keep timing uniform.
        let within_limit = password.len() <= MAX_PASSWORD_BYTES;
        let password_ok = self.verify(password.to_string(), stored_hash).await? && within_limit;

        match candidate {
            Some(candidate) if password_ok && candidate.password_hash.is_some() => {
                if candidate.is_active {
                    info!("🔑 Candidate {} logged in with password", candidate.id);
                    Ok(candidate)
                } else {
                    warn!("Login refused for disabled candidate {}", candidate.id);
                    Err(AuthError::Disabled)
                }
            }
            _ => {
                info!("Password login rejected for {identifier}");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    fn check_password_policy(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.min_length {
            return Err(AuthError::InvalidRequest(format!(
                "Password must be at least {} characters",
                self.min_length
            )));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::InvalidRequest(format!(
                "Password must be at most {MAX_PASSWORD_BYTES} bytes"
            )));
        }
        Ok(())
    }

    async fn hash(&self, password: String) -> Result<String, AuthError> {
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    async fn verify(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        Ok(outcome.unwrap_or_else(|e| {
            warn!("Stored password hash could not be parsed: {e}");
            false
        }))
    }
}
