use actix_web::{web, HttpResponse, Result};
use log::warn;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::authentication::AuthServices;
use crate::settings::PocketsendSettings;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Liveness probe
///
/// # Errors
/// Never fails
pub async fn ping() -> Result<HttpResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        message: "PocketSEND candidate auth service is running".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Readiness probe: the store must answer within the request deadline
///
/// # Errors
/// Never fails; an unhealthy store yields 503
pub async fn health(
    services: web::Data<AuthServices>,
    settings: web::Data<PocketsendSettings>,
) -> Result<HttpResponse> {
    let limit = Duration::from_secs(settings.application.request_timeout_seconds.max(1));
    let database = match tokio::time::timeout(limit, services.directory.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Readiness check failed: {e}");
            false
        }
        Err(_) => {
            warn!("Readiness check timed out");
            false
        }
    };

    let body = json!({
        "healthy": database,
        "checks": { "database": database },
    });
    if database {
        Ok(HttpResponse::Ok().json(body))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(body))
    }
}
