// Magic-link handlers: request a link, redeem a token
use actix_web::{web, HttpResponse, Result};
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

use super::helpers::{bad_request, error_response, run_with_timeout};
use crate::authentication::AuthServices;
use crate::magic_link::IssueOutcome;
use crate::models::VerificationOutcome;
use crate::settings::PocketsendSettings;
use crate::validation::ContactIdentifier;

#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyTokenRequest {
    pub token: Option<String>,
}

/// `POST /auth/magic-link`
///
/// Unknown numbers get the same 200 as known ones so the endpoint cannot be
/// used to probe which candidates exist.
///
/// # Errors
/// Never returns an actix error; failures are rendered as JSON responses
pub async fn request_magic_link(
    body: web::Json<MagicLinkRequest>,
    services: web::Data<AuthServices>,
    settings: web::Data<PocketsendSettings>,
) -> Result<HttpResponse> {
    let Some(raw_phone) = body.phone.as_deref().filter(|p| !p.trim().is_empty()) else {
        return Ok(bad_request("Phone number is required"));
    };

    let contact = match ContactIdentifier::phone(raw_phone) {
        Ok(contact) => contact,
        Err(e) => return Ok(error_response(&e)),
    };

    let issuance = services.issuer.issue(&contact);
    let outcome = match run_with_timeout(&settings, "magic link issuance", issuance).await {
        Ok(outcome) => outcome,
        Err(response) => return Ok(response),
    };

    let mut payload = json!({
        "success": true,
        "message": "Magic link sent successfully",
    });

    match outcome {
        IssueOutcome::Issued(issued) => {
            if !settings.is_production() {
                payload["debugLink"] = json!(issued.link);
                payload["expiresAt"] = json!(issued.expires_at.to_rfc3339());
            }
        }
        IssueOutcome::UnknownContact => {
            debug!("No link issued for {contact}");
        }
    }

    Ok(HttpResponse::Ok().json(payload))
}

/// `POST /auth/verify-token`
///
/// # Errors
/// Never returns an actix error; failures are rendered as JSON responses
pub async fn verify_token(
    body: web::Json<VerifyTokenRequest>,
    services: web::Data<AuthServices>,
    settings: web::Data<PocketsendSettings>,
) -> Result<HttpResponse> {
    let Some(token) = body.token.as_deref().filter(|t| !t.trim().is_empty()) else {
        return Ok(bad_request("Token is required"));
    };

    let verification = services.verifier.verify(token);
    let outcome = match run_with_timeout(&settings, "token verification", verification).await {
        Ok(outcome) => outcome,
        Err(response) => return Ok(response),
    };

    info!("Token verification finished: {}", outcome.label());

    let response = match outcome {
        VerificationOutcome::Valid(candidate) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Token verified successfully",
            "candidate": candidate.profile(),
        })),
        VerificationOutcome::Invalid => rejection("invalid_token", "Invalid or expired token"),
        VerificationOutcome::AlreadyUsed => {
            rejection("already_used", "This link has already been used")
        }
        VerificationOutcome::Expired => HttpResponse::BadRequest().json(json!({
            "success": false,
            "code": "expired",
            "error": "This link has expired. Please request a new one.",
            "expired": true,
        })),
    };
    Ok(response)
}

fn rejection(code: &str, message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "code": code,
        "error": message,
    }))
}
