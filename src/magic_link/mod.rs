//! Passwordless sign-in through single-use links
//!
//! - [`token`] mints opaque token values with an expiry
//! - [`issuer`] stores a fresh token for a candidate and hands the link to a dispatcher
//! - [`verifier`] redeems a presented token exactly once
//! - [`dispatch`] delivers links (log or webhook gateway)

pub mod dispatch;
pub mod issuer;
pub mod token;
pub mod verifier;

pub use dispatch::{
    DeliveryMessage, DispatchError, LogDispatcher, MessageDispatcher, WebhookDispatcher,
};
pub use issuer::{IssueOutcome, IssuedLink, MagicLinkIssuer};
pub use token::{GeneratedToken, TokenGenerator};
pub use verifier::TokenVerifier;
