//! Response helpers shared by the auth handlers
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use log::{error, warn};
use serde_json::json;
use std::future::Future;
use std::time::Duration;

use crate::models::AuthError;
use crate::settings::PocketsendSettings;

pub const GENERIC_SERVER_ERROR: &str = "Internal server error";

/// 400 `{success:false, error}`
#[must_use]
pub fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "error": message,
    }))
}

/// Map a service error to its HTTP response. Storage details are logged, never returned.
#[must_use]
pub fn error_response(err: &AuthError) -> HttpResponse {
    match err {
        AuthError::InvalidRequest(message) => bad_request(message),
        AuthError::InvalidCredentials => HttpResponse::Unauthorized().json(json!({
            "success": false,
            "error": "Invalid email or password",
        })),
        AuthError::Disabled => HttpResponse::Forbidden().json(json!({
            "success": false,
            "error": "Account is disabled. Please contact support.",
        })),
        AuthError::DuplicateContact => {
            bad_request("A candidate with this email or mobile number already exists")
        }
        AuthError::Store(e) => {
            error!("Storage failure while handling request: {e}");
            server_error(true)
        }
        AuthError::CorruptToken { .. } => {
            // Already logged loudly by the verifier
            server_error(false)
        }
        AuthError::TokenGeneration(e) | AuthError::Hashing(e) => {
            error!("Cryptographic primitive failed: {e}");
            server_error(false)
        }
    }
}

fn server_error(retryable: bool) -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({
        "success": false,
        "error": GENERIC_SERVER_ERROR,
        "retryable": retryable,
    }))
}

/// 503 returned when a request runs past the configured deadline
#[must_use]
pub fn timeout_response() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(json!({
        "success": false,
        "error": "The request timed out. Please try again.",
        "retryable": true,
    }))
}

/// Run a service call under the request deadline, turning failures into responses
///
/// # Errors
///
/// Returns the ready-to-send error response on timeout or service error.
pub async fn run_with_timeout<T, F>(
    settings: &PocketsendSettings,
    operation: &str,
    fut: F,
) -> Result<T, HttpResponse>
where
    F: Future<Output = Result<T, AuthError>>,
{
    let limit = Duration::from_secs(settings.application.request_timeout_seconds.max(1));
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(error_response(&e)),
        Err(_) => {
            warn!("⏱️  {operation} timed out after {}s", limit.as_secs());
            Err(timeout_response())
        }
    }
}

/// JSON extractor configuration: malformed bodies get the same envelope as other errors
#[must_use]
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(16 * 1024)
        .error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
            let message = match &err {
                JsonPayloadError::ContentType => "Content-Type must be application/json",
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    "Request body is too large"
                }
                _ => "Request body is not valid JSON",
            };
            actix_web::error::InternalError::from_response(err, bad_request(message)).into()
        })
}
