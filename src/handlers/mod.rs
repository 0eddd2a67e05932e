// HTTP request handlers for candidate authentication
pub mod auth;
pub mod candidate;
pub mod health;
pub mod helpers;

use actix_web::web;

pub use auth::{request_magic_link, verify_token};
pub use candidate::{candidate_login, candidate_signup};
pub use health::{health, ping};
pub use helpers::json_config;

/// Register every route on an app or test service
pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg
        // Magic-link endpoints
        .route("/auth/magic-link", web::post().to(request_magic_link))
        .route("/auth/verify-token", web::post().to(verify_token))
        // Password endpoints
        .route("/auth/candidate-signup", web::post().to(candidate_signup))
        .route("/auth/candidate-login", web::post().to(candidate_login))
        // System endpoints
        .route("/ping", web::get().to(ping))
        .route("/health", web::get().to(health));
}
