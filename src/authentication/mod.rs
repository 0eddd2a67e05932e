//! Authentication service assembly
//!
//! Builds the candidate directory, magic-link pipelines and password
//! authenticator from configuration and shares them with the HTTP layer.

pub mod factory;

pub use factory::{AuthServiceFactory, AuthServices, ServiceInitError, StorageBackends};
