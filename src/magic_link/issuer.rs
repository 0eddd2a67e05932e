//! Magic-link issuance pipeline
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::dispatch::{DeliveryMessage, MessageDispatcher};
use super::token::TokenGenerator;
use crate::directory::CandidateDirectory;
use crate::models::{AuthError, Candidate, CandidateId, NewAuthToken, TokenId, TokenPurpose};
use crate::store::{StoreError, TokenStore};
use crate::validation::ContactIdentifier;

/// Path under the base URL where the UI's verification page lives
const VERIFY_PATH: &str = "auth/verify/";

/// Attempts at minting a value that does not collide with a stored token
const MINT_ATTEMPTS: usize = 2;

/// Default bound on a background delivery
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A link that has been stored and handed to the dispatcher
#[derive(Clone)]
pub struct IssuedLink {
    pub candidate_id: CandidateId,
    pub token_id: TokenId,
    pub link: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedLink")
            .field("candidate_id", &self.candidate_id)
            .field("token_id", &self.token_id)
            .field("link", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum IssueOutcome {
    Issued(IssuedLink),
    /// No candidate holds this contact and auto-provisioning is off
    UnknownContact,
}

pub struct MagicLinkIssuer {
    directory: CandidateDirectory,
    tokens: Arc<dyn TokenStore>,
    generator: TokenGenerator,
    dispatcher: Arc<dyn MessageDispatcher>,
    verify_base: Url,
    auto_provision: bool,
    dispatch_timeout: Duration,
}

impl MagicLinkIssuer {
    /// # Errors
    ///
    /// Returns a parse error when `base_url` is not an absolute URL that can
    /// carry a path.
    pub fn new(
        directory: CandidateDirectory,
        tokens: Arc<dyn TokenStore>,
        generator: TokenGenerator,
        dispatcher: Arc<dyn MessageDispatcher>,
        base_url: &str,
        auto_provision: bool,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            directory,
            tokens,
            generator,
            dispatcher,
            verify_base: verify_base(base_url)?,
            auto_provision,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        })
    }

    /// Deliveries still running after `timeout` are dropped and logged as failed.
    #[must_use]
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    /// Issue a fresh magic link for `contact`, retiring any earlier unused one.
    ///
    /// # Errors
    ///
    /// `Store` on persistence failure (nothing is dispatched in that case),
    /// `TokenGeneration` if the entropy source fails.
    pub async fn issue(&self, contact: &ContactIdentifier) -> Result<IssueOutcome, AuthError> {
        let Some(candidate) = self.directory.resolve(contact, self.auto_provision).await? else {
            info!("Magic link requested for unknown {contact}, nothing issued");
            return Ok(IssueOutcome::UnknownContact);
        };

        let issued = self.mint(&candidate, contact).await?;
        info!(
            "🔗 Issued magic link token {} for candidate {} (expires {})",
            issued.token_id,
            issued.candidate_id,
            issued.expires_at.to_rfc3339()
        );

        self.spawn_dispatch(DeliveryMessage {
            destination: contact.clone(),
            link: issued.link.clone(),
            expires_at: issued.expires_at,
        });

        Ok(IssueOutcome::Issued(issued))
    }

    async fn mint(
        &self,
        candidate: &Candidate,
        contact: &ContactIdentifier,
    ) -> Result<IssuedLink, AuthError> {
        for attempt in 1..=MINT_ATTEMPTS {
            let generated = self.generator.generate()?;
            let new_token = NewAuthToken {
                candidate_id: candidate.id,
                purpose: TokenPurpose::MagicLink,
                token: generated.value.clone(),
                expires_at: generated.expires_at,
                metadata: json!({
                    "channel": self.dispatcher.channel(),
                    "contact": contact.kind(),
                }),
            };

            match self.tokens.issue(new_token).await {
                Ok(token_id) => {
                    let link = self
                        .verify_base
                        .join(&generated.value)
                        .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;
                    return Ok(IssuedLink {
                        candidate_id: candidate.id,
                        token_id,
                        link: link.into(),
                        expires_at: generated.expires_at,
                    });
                }
                Err(StoreError::DuplicateToken) => {
                    warn!("Token value collision on attempt {attempt}, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::DuplicateToken.into())
    }

    fn spawn_dispatch(&self, message: DeliveryMessage) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let timeout = self.dispatch_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, dispatcher.dispatch(&message)).await {
                Ok(Ok(())) => debug!(
                    "Delivered magic link to {} via {}",
                    message.destination,
                    dispatcher.channel()
                ),
                Ok(Err(e)) => warn!(
                    "⚠️  Magic link delivery to {} via {} failed: {e}",
                    message.destination,
                    dispatcher.channel()
                ),
                Err(_) => warn!(
                    "⚠️  Magic link delivery to {} via {} failed: timed out after {}ms",
                    message.destination,
                    dispatcher.channel(),
                    timeout.as_millis()
                ),
            }
        });
    }
}

/// `{base}/auth/verify/` with exactly one slash at the join
fn verify_base(base_url: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(VERIFY_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_base_handles_trailing_slash() {
        assert_eq!(
            verify_base("http://localhost:5000").unwrap().as_str(),
            "http://localhost:5000/auth/verify/"
        );
        assert_eq!(
            verify_base("https://app.pocketsend.test/portal/").unwrap().as_str(),
            "https://app.pocketsend.test/portal/auth/verify/"
        );
        assert_eq!(
            verify_base("https://app.pocketsend.test/portal").unwrap().as_str(),
            "https://app.pocketsend.test/portal/auth/verify/"
        );
    }

    #[test]
    fn test_verify_base_rejects_relative_urls() {
        assert!(verify_base("/auth").is_err());
        assert!(verify_base("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_token_joins_as_last_segment() {
        let base = verify_base("http://localhost:5000").unwrap();
        let link = base.join("abc-DEF_123").unwrap();
        assert_eq!(link.as_str(), "http://localhost:5000/auth/verify/abc-DEF_123");
    }
}
