#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the pocketsend service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod authentication;
pub mod directory;
pub mod handlers;
pub mod magic_link;
pub mod models;
pub mod password;
pub mod settings;
pub mod store;
pub mod utils;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use authentication::{AuthServiceFactory, AuthServices};
pub use handlers::{configure_services, json_config};
pub use models::{AuthError, Candidate, VerificationOutcome};
pub use settings::PocketsendSettings;
