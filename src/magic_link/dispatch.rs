//! Delivery of verification links to candidates
//!
//! Issuance never waits on these; the issuer spawns the dispatch and only logs
//! the result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::validation::ContactIdentifier;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("message gateway request failed: {0}")]
    Transport(String),
    #[error("message gateway rejected the message with status {0}")]
    Rejected(u16),
}

/// One outgoing link
#[derive(Clone)]
pub struct DeliveryMessage {
    pub destination: ContactIdentifier,
    pub link: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for DeliveryMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryMessage")
            .field("destination", &self.destination.to_string())
            .field("link", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    /// Short label recorded in token metadata and logs
    fn channel(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns a [`DispatchError`] when the message could not be handed off.
    async fn dispatch(&self, message: &DeliveryMessage) -> Result<(), DispatchError>;
}

/// Development dispatcher: records that a link exists without sending it anywhere
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl MessageDispatcher for LogDispatcher {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn dispatch(&self, message: &DeliveryMessage) -> Result<(), DispatchError> {
        info!(
            "📨 Magic link ready for {} (expires {})",
            message.destination,
            message.expires_at.to_rfc3339()
        );
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    to: &'a str,
    link: &'a str,
    expires_at: DateTime<Utc>,
}

/// Posts each link to an SMS/email gateway as JSON
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: Client,
    url: String,
    bearer_token: Option<String>,
}

impl WebhookDispatcher {
    /// Every request, connect included, is abandoned after `timeout`.
    #[must_use]
    pub fn new(url: impl Into<String>, bearer_token: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("⚠️  Failed to build webhook client with timeout: {e}, using defaults");
                Client::new()
            });

        Self {
            client,
            url: url.into(),
            bearer_token,
        }
    }
}

#[async_trait]
impl MessageDispatcher for WebhookDispatcher {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn dispatch(&self, message: &DeliveryMessage) -> Result<(), DispatchError> {
        let payload = WebhookPayload {
            to: message.destination.as_str(),
            link: &message.link,
            expires_at: message.expires_at,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DispatchError::Rejected(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> DeliveryMessage {
        DeliveryMessage {
            destination: ContactIdentifier::phone("+44 7700 900000").unwrap(),
            link: "http://localhost:5000/auth/verify/secret-token".to_string(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_log_dispatcher_always_succeeds() {
        assert!(LogDispatcher.dispatch(&message()).await.is_ok());
        assert_eq!(LogDispatcher.channel(), "log");
    }

    #[test]
    fn test_message_debug_hides_link() {
        let rendered = format!("{:?}", message());
        assert!(!rendered.contains("secret-token"));
        assert!(!rendered.contains("7700 900000"));
    }

    #[test]
    fn test_webhook_payload_shape() {
        let msg = message();
        let payload = WebhookPayload {
            to: msg.destination.as_str(),
            link: &msg.link,
            expires_at: msg.expires_at,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["to"], "+44 7700 900000");
        assert!(json.get("expiresAt").is_some());
    }

    #[tokio::test]
    async fn test_webhook_transport_failure_is_reported() {
        // Port 9 (discard) on loopback is not listening in test environments
        let dispatcher =
            WebhookDispatcher::new("http://127.0.0.1:9/hook", None, Duration::from_secs(2));
        let err = dispatcher.dispatch(&message()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Transport(_)));
    }

    #[tokio::test]
    async fn test_webhook_gives_up_on_silent_gateway() {
        // Accepts the connection but never writes a response
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let dispatcher = WebhookDispatcher::new(
            format!("http://{addr}/hook"),
            None,
            Duration::from_millis(200),
        );
        let result = tokio::time::timeout(Duration::from_secs(5), dispatcher.dispatch(&message()))
            .await
            .expect("client timeout should fire first");
        assert!(matches!(result, Err(DispatchError::Transport(_))));
        server.abort();
    }
}
