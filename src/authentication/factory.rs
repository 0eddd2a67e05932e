//! Service factory for wiring the authentication pipelines
//!
//! Storage, dispatch and time are created once at process start and handed to
//! every component; handlers only ever see the assembled [`AuthServices`].

use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;

use crate::directory::CandidateDirectory;
use crate::magic_link::{
    LogDispatcher, MagicLinkIssuer, MessageDispatcher, TokenGenerator, TokenVerifier,
    WebhookDispatcher,
};
use crate::password::PasswordAuthenticator;
use crate::settings::{PocketsendSettings, SettingsError, MAX_TTL_SECONDS};
use crate::store::{CandidateStore, MemoryStore, StoreError, TokenStore};
use crate::utils::clock::{Clock, SystemClock};

#[derive(Debug, Error)]
pub enum ServiceInitError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to open storage: {0}")]
    Store(#[from] StoreError),
}

/// Everything the HTTP layer needs, cheap to clone into each worker
#[derive(Clone)]
pub struct AuthServices {
    pub directory: CandidateDirectory,
    pub issuer: Arc<MagicLinkIssuer>,
    pub verifier: Arc<TokenVerifier>,
    pub passwords: Arc<PasswordAuthenticator>,
}

/// Storage handles shared by the directory, issuer and verifier
#[derive(Clone)]
pub struct StorageBackends {
    pub candidates: Arc<dyn CandidateStore>,
    pub tokens: Arc<dyn TokenStore>,
}

impl StorageBackends {
    #[must_use]
    pub fn memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            candidates: store.clone(),
            tokens: store,
        }
    }
}

/// Factory for creating authentication services with dependency injection
pub struct AuthServiceFactory;

impl AuthServiceFactory {
    /// Build storage and dispatch from configuration, then assemble the services.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend cannot be opened or the
    /// configuration is unusable.
    pub async fn create(settings: &PocketsendSettings) -> Result<AuthServices, ServiceInitError> {
        log::info!("🏭 Starting authentication service factory...");

        let storage = Self::open_storage(settings).await?;
        let dispatcher = Self::create_dispatcher(settings);
        let services = Self::assemble(settings, storage, dispatcher, Arc::new(SystemClock))?;

        log::info!("🏭 Authentication service factory completed successfully");
        Ok(services)
    }

    /// Assemble services around caller-supplied collaborators.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` if the base URL cannot hold
    /// verification links, or the TTL, dispatch timeout or bcrypt cost is
    /// out of range.
    pub fn assemble(
        settings: &PocketsendSettings,
        storage: StorageBackends,
        dispatcher: Arc<dyn MessageDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Result<AuthServices, SettingsError> {
        let directory = CandidateDirectory::new(storage.candidates);

        let ttl = Some(settings.magic_link.ttl_seconds)
            .filter(|seconds| (1..=MAX_TTL_SECONDS).contains(seconds))
            .and_then(|seconds| i64::try_from(seconds).ok())
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                SettingsError::Invalid(format!(
                    "ttl_seconds must be between 1 and {MAX_TTL_SECONDS}, got {}",
                    settings.magic_link.ttl_seconds
                ))
            })?;
        let generator = TokenGenerator::new(settings.magic_link.token_bytes, ttl, clock.clone());

        let issuer = MagicLinkIssuer::new(
            directory.clone(),
            storage.tokens.clone(),
            generator,
            dispatcher,
            &settings.application.base_url,
            settings.magic_link.auto_provision,
        )
        .map_err(|e| SettingsError::Invalid(format!("base_url: {e}")))?
        .with_dispatch_timeout(dispatch_timeout(settings)?);

        let verifier = TokenVerifier::new(directory.clone(), storage.tokens, clock);
        let passwords = PasswordAuthenticator::new(
            directory.clone(),
            settings.password.bcrypt_cost,
            settings.password.min_length,
        )
        .map_err(|e| SettingsError::Invalid(format!("bcrypt_cost: {e}")))?;

        if settings.magic_link.auto_provision {
            log::info!("⚠️  Magic links will auto-provision unknown phone numbers");
        }

        Ok(AuthServices {
            directory,
            issuer: Arc::new(issuer),
            verifier: Arc::new(verifier),
            passwords: Arc::new(passwords),
        })
    }

    async fn open_storage(settings: &PocketsendSettings) -> Result<StorageBackends, ServiceInitError> {
        match settings.storage.backend.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let store = Arc::new(
                    crate::store::SqliteStore::open(&settings.storage.database_url).await?,
                );
                log::info!("✅ Storage backend: sqlite");
                Ok(StorageBackends {
                    candidates: store.clone(),
                    tokens: store,
                })
            }
            "memory" => {
                log::info!("✅ Storage backend: in-memory (data is lost on restart)");
                Ok(StorageBackends::memory(MemoryStore::new()))
            }
            other => Err(SettingsError::Invalid(format!("unknown storage backend {other:?}")).into()),
        }
    }

    fn create_dispatcher(settings: &PocketsendSettings) -> Arc<dyn MessageDispatcher> {
        match (settings.dispatch.mode.as_str(), &settings.dispatch.webhook_url) {
            ("webhook", Some(url)) => {
                log::info!("✅ Magic links dispatched via webhook");
                Arc::new(WebhookDispatcher::new(
                    url.clone(),
                    settings.dispatch.webhook_token.clone(),
                    std::time::Duration::from_secs(settings.dispatch.timeout_seconds),
                ))
            }
            _ => {
                log::info!("⚠️  Magic links are only logged, no messages will be sent");
                Arc::new(LogDispatcher)
            }
        }
    }
}

fn dispatch_timeout(settings: &PocketsendSettings) -> Result<std::time::Duration, SettingsError> {
    match settings.dispatch.timeout_seconds {
        0 => Err(SettingsError::Invalid(
            "dispatch timeout_seconds must be greater than zero".to_string(),
        )),
        seconds => Ok(std::time::Duration::from_secs(seconds)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_with_memory_backend() {
        let settings = PocketsendSettings::default();
        assert!(AuthServiceFactory::create(&settings).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_backend_is_rejected() {
        let mut settings = PocketsendSettings::default();
        settings.storage.backend = "postgres".to_string();
        assert!(matches!(
            AuthServiceFactory::create(&settings).await,
            Err(ServiceInitError::Settings(SettingsError::Invalid(_)))
        ));
    }

    #[test]
    fn test_assemble_rejects_unusable_base_url() {
        let mut settings = PocketsendSettings::default();
        settings.application.base_url = "not a url".to_string();
        let result = AuthServiceFactory::assemble(
            &settings,
            StorageBackends::memory(MemoryStore::new()),
            Arc::new(LogDispatcher),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_assemble_rejects_out_of_range_ttl() {
        for ttl_seconds in [0, MAX_TTL_SECONDS + 1, u64::MAX] {
            let mut settings = PocketsendSettings::default();
            settings.magic_link.ttl_seconds = ttl_seconds;
            let result = AuthServiceFactory::assemble(
                &settings,
                StorageBackends::memory(MemoryStore::new()),
                Arc::new(LogDispatcher),
                Arc::new(SystemClock),
            );
            assert!(
                matches!(result, Err(SettingsError::Invalid(_))),
                "ttl {ttl_seconds} should be rejected"
            );
        }
    }

    #[test]
    fn test_assemble_rejects_zero_dispatch_timeout() {
        let mut settings = PocketsendSettings::default();
        settings.dispatch.timeout_seconds = 0;
        let result = AuthServiceFactory::assemble(
            &settings,
            StorageBackends::memory(MemoryStore::new()),
            Arc::new(LogDispatcher),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_webhook_dispatcher_selected_when_configured() {
        let mut settings = PocketsendSettings::default();
        settings.dispatch.mode = "webhook".to_string();
        settings.dispatch.webhook_url = Some("https://sms.example.com/send".to_string());
        assert_eq!(AuthServiceFactory::create_dispatcher(&settings).channel(), "webhook");

        settings.dispatch.webhook_url = None;
        assert_eq!(AuthServiceFactory::create_dispatcher(&settings).channel(), "log");
    }
}
