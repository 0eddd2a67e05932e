// Password signup and login for candidates
use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;

use super::helpers::{bad_request, error_response, run_with_timeout};
use crate::authentication::AuthServices;
use crate::password::CandidateRegistration;
use crate::settings::PocketsendSettings;
use crate::validation::ContactIdentifier;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// `POST /auth/candidate-signup`
///
/// # Errors
/// Never returns an actix error; failures are rendered as JSON responses
pub async fn candidate_signup(
    body: web::Json<SignupRequest>,
    services: web::Data<AuthServices>,
    settings: web::Data<PocketsendSettings>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let (Some(first_name), Some(last_name), Some(email), Some(phone), Some(password)) = (
        present(body.first_name.as_ref()),
        present(body.last_name.as_ref()),
        present(body.email.as_ref()),
        present(body.mobile_number.as_ref()),
        body.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Ok(bad_request("All fields are required"));
    };

    let registration = CandidateRegistration {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        password: password.to_string(),
    };

    let signup = services.passwords.register(registration);
    match run_with_timeout(&settings, "candidate signup", signup).await {
        Ok(candidate) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Candidate account created successfully",
            "data": {
                "candidate_id": candidate.id,
                "email": candidate.email,
            },
        }))),
        Err(response) => Ok(response),
    }
}

/// `POST /auth/candidate-login`
///
/// Accepts either an email or a phone number as the identifier.
///
/// # Errors
/// Never returns an actix error; failures are rendered as JSON responses
pub async fn candidate_login(
    body: web::Json<LoginRequest>,
    services: web::Data<AuthServices>,
    settings: web::Data<PocketsendSettings>,
) -> Result<HttpResponse> {
    let identifier = present(body.email.as_ref()).or_else(|| present(body.phone.as_ref()));
    let password = body.password.as_deref().filter(|p| !p.is_empty());
    let (Some(identifier), Some(password)) = (identifier, password) else {
        return Ok(bad_request("Email and password are required"));
    };

    let identifier = match ContactIdentifier::parse(identifier) {
        Ok(identifier) => identifier,
        Err(e) => return Ok(error_response(&e)),
    };

    let login = services.passwords.authenticate(&identifier, password);
    match run_with_timeout(&settings, "candidate login", login).await {
        Ok(candidate) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Login successful",
            "candidate": candidate.profile(),
        }))),
        Err(response) => Ok(response),
    }
}
