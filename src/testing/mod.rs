//! Testing utilities for PocketSEND
//!
//! Compiled for unit tests and, behind the `testing` feature, for the
//! integration tests under `tests/`.
//!
//! - [`fixtures`] - Pre-built settings, assembled services and seeded candidates
//! - [`mock`] - Manual clock, recording dispatchers and failing stores
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pocketsend::testing::TestFixtures;
//!
//! let test = TestFixtures::services(TestFixtures::settings());
//! let candidate = test.seed_candidate("+44 7700 900000").await;
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::{TestFixtures, TestServices, TEST_BCRYPT_COST};
pub use mock::{
    EmptyCandidateStore, FailingDispatcher, HangingDispatcher, ManualClock, RecordingDispatcher,
    StalledStore, UnavailableStore,
};

/// Common test constants
pub mod constants {
    /// Default candidate phone number
    pub const TEST_PHONE: &str = "+44 7700 900000";

    /// Default candidate email address
    pub const TEST_EMAIL: &str = "ada@example.com";

    pub const TEST_FIRST_NAME: &str = "Ada";

    pub const TEST_LAST_NAME: &str = "Lovelace";

    /// Satisfies the default password policy
    pub const TEST_PASSWORD: &str = "correct horse battery";
}
