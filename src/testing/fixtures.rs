//! Pre-built settings, services and candidates for tests
//!
//! Services are assembled around a [`MemoryStore`], a [`ManualClock`] and a
//! [`RecordingDispatcher`] so every collaborator can be inspected afterwards.

use std::sync::Arc;

use super::constants::{TEST_EMAIL, TEST_FIRST_NAME, TEST_LAST_NAME, TEST_PASSWORD, TEST_PHONE};
use super::mock::{ManualClock, RecordingDispatcher};
use crate::authentication::{AuthServiceFactory, AuthServices, StorageBackends};
use crate::magic_link::MessageDispatcher;
use crate::models::Candidate;
use crate::password::CandidateRegistration;
use crate::settings::PocketsendSettings;
use crate::store::MemoryStore;
use crate::validation::ContactIdentifier;

/// bcrypt's minimum cost keeps password tests fast
pub const TEST_BCRYPT_COST: u32 = 4;

/// Assembled services plus handles on their fake collaborators
pub struct TestServices {
    pub services: AuthServices,
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub settings: PocketsendSettings,
}

impl TestServices {
    /// Insert a phone-only candidate, as a first magic-link request would
    ///
    /// # Panics
    ///
    /// Panics if `phone` is malformed or the insert fails.
    pub async fn seed_candidate(&self, phone: &str) -> Candidate {
        let contact = ContactIdentifier::phone(phone).unwrap();
        self.services.directory.create_placeholder(&contact).await.unwrap()
    }

    /// Register the default candidate with [`TEST_PASSWORD`]
    ///
    /// # Panics
    ///
    /// Panics if registration fails.
    pub async fn seed_password_candidate(&self) -> Candidate {
        self.services
            .passwords
            .register(TestFixtures::registration())
            .await
            .unwrap()
    }
}

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Development settings with a cheap bcrypt cost and auto-provisioning on
    #[must_use]
    pub fn settings() -> PocketsendSettings {
        let mut settings = PocketsendSettings::default();
        settings.password.bcrypt_cost = TEST_BCRYPT_COST;
        settings.magic_link.auto_provision = true;
        settings
    }

    /// Same as [`TestFixtures::settings`] but reporting a production environment
    #[must_use]
    pub fn production_settings() -> PocketsendSettings {
        let mut settings = Self::settings();
        settings.application.environment = "production".to_string();
        settings
    }

    /// Services over a fresh in-memory store
    ///
    /// # Panics
    ///
    /// Panics if `settings` cannot be assembled into services.
    #[must_use]
    pub fn services(settings: PocketsendSettings) -> TestServices {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());

        let services = AuthServiceFactory::assemble(
            &settings,
            StorageBackends::memory(store.clone()),
            dispatcher.clone(),
            clock.clone(),
        )
        .unwrap();

        TestServices {
            services,
            store,
            clock,
            dispatcher,
            settings,
        }
    }

    /// Services over arbitrary storage, for outage and latency scenarios
    ///
    /// # Panics
    ///
    /// Panics if `settings` cannot be assembled into services.
    #[must_use]
    pub fn services_with_storage(
        settings: &PocketsendSettings,
        storage: StorageBackends,
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> AuthServices {
        AuthServiceFactory::assemble(settings, storage, dispatcher, Arc::new(ManualClock::default()))
            .unwrap()
    }

    /// A complete, valid signup
    #[must_use]
    pub fn registration() -> CandidateRegistration {
        CandidateRegistration {
            first_name: TEST_FIRST_NAME.to_string(),
            last_name: TEST_LAST_NAME.to_string(),
            email: TEST_EMAIL.to_string(),
            phone: TEST_PHONE.to_string(),
            password: TEST_PASSWORD.to_string(),
        }
    }
}
