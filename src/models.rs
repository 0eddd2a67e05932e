//! Candidate and auth-token records shared by the directory, token store and
//! HTTP layer.

pub mod auth;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use auth::{AuthError, VerificationOutcome};

/// Candidate primary key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub Uuid);

impl CandidateId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CandidateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Auth token primary key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub Uuid);

impl TokenId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Candidate identity record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub id: CandidateId,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub experience_level: Option<String>,
    pub confidence_score: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    /// The public identity payload returned to clients after authentication.
    #[must_use]
    pub fn profile(&self) -> CandidateProfile {
        CandidateProfile {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Fields needed to insert a candidate row
#[derive(Clone, Debug)]
pub struct NewCandidate {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: bool,
}

impl NewCandidate {
    /// Minimal record created from a bare phone number on first magic-link request
    #[must_use]
    pub fn placeholder(phone: &str) -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            phone: phone.to_string(),
            email: None,
            password_hash: None,
            is_active: true,
        }
    }
}

/// Candidate payload serialized into API responses (never carries the hash)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub id: CandidateId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: String,
}

/// What an auth token may be redeemed for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    MagicLink,
    PasswordReset,
}

impl TokenPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TokenPurpose::MagicLink => "magic_link",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }

    /// Parse the stored purpose tag
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "magic_link" => Some(TokenPurpose::MagicLink),
            "password_reset" => Some(TokenPurpose::PasswordReset),
            _ => None,
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issued credential
#[derive(Clone, PartialEq)]
pub struct AuthToken {
    pub id: TokenId,
    pub candidate_id: CandidateId,
    pub token: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuthToken {
    /// Expiry is exclusive: a token is still usable at exactly `expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// The raw value is a bearer credential, keep it out of logs.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("id", &self.id)
            .field("candidate_id", &self.candidate_id)
            .field("token", &"[REDACTED]")
            .field("purpose", &self.purpose)
            .field("expires_at", &self.expires_at)
            .field("consumed", &self.consumed)
            .field("consumed_at", &self.consumed_at)
            .field("metadata", &self.metadata)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Fields needed to insert a token row
#[derive(Clone)]
pub struct NewAuthToken {
    pub candidate_id: CandidateId,
    pub purpose: TokenPurpose,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl fmt::Debug for NewAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAuthToken")
            .field("candidate_id", &self.candidate_id)
            .field("purpose", &self.purpose)
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Result of the compare-and-set consume on a token row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed,
    AlreadyConsumed,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_at: DateTime<Utc>) -> AuthToken {
        AuthToken {
            id: TokenId::new(),
            candidate_id: CandidateId::new(),
            token: "secret-value".to_string(),
            purpose: TokenPurpose::MagicLink,
            expires_at,
            consumed: false,
            consumed_at: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let t = token(now);
        assert!(!t.is_expired_at(now));
        assert!(t.is_expired_at(now + Duration::milliseconds(1)));
    }

    #[test]
    fn test_token_debug_redacts_value() {
        let t = token(Utc::now());
        let rendered = format!("{t:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_purpose_tags() {
        assert_eq!(TokenPurpose::MagicLink.as_str(), "magic_link");
        assert_eq!(
            TokenPurpose::parse("password_reset"),
            Some(TokenPurpose::PasswordReset)
        );
        assert_eq!(TokenPurpose::parse("session"), None);
    }

    #[test]
    fn test_profile_serializes_camel_case() {
        let now = Utc::now();
        let candidate = Candidate {
            id: CandidateId::new(),
            first_name: "Amira".to_string(),
            last_name: "Khan".to_string(),
            phone: "+44 7700 900000".to_string(),
            email: Some("amira@example.com".to_string()),
            password_hash: Some("$2b$12$hash".to_string()),
            is_active: true,
            experience_level: None,
            confidence_score: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(candidate.profile()).unwrap();
        assert_eq!(json["firstName"], "Amira");
        assert_eq!(json["phone"], "+44 7700 900000");
        assert!(json.get("passwordHash").is_none());
    }
}
