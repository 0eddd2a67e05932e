#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use pocketsend::{
    authentication::{AuthServiceFactory, AuthServices},
    handlers::{configure_services, json_config},
    settings::PocketsendSettings,
    VERSION,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = PocketsendSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    let services = AuthServiceFactory::create(&settings)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to initialize services: {e}")))?;

    start_server(services, settings).await
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(services: AuthServices, settings: PocketsendSettings) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let cors_origins = settings.get_cors_origins();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type", "Accept"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(services.clone()))
            .app_data(web::Data::new(settings.clone()))
            .app_data(json_config())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &PocketsendSettings) {
    println!("Starting PocketSEND candidate auth v{VERSION} on http://{bind_address}");
    println!("Environment: {}", settings.application.environment);
    println!("Storage backend: {}", settings.storage.backend);
    println!("Dispatch mode: {}", settings.dispatch.mode);
    println!();
    println!("Magic-link endpoints:");
    println!("  POST /auth/magic-link       - Send a sign-in link to a phone number");
    println!("  POST /auth/verify-token     - Redeem a sign-in link token");
    println!(
        "  Links point at {}/auth/verify/{{token}} and expire after {}s",
        settings.application.base_url.trim_end_matches('/'),
        settings.magic_link.ttl_seconds
    );
    println!();
    println!("Password endpoints:");
    println!("  POST /auth/candidate-signup - Create a candidate account");
    println!("  POST /auth/candidate-login  - Sign in with email or phone and password");
    println!();
    println!("System endpoints:");
    println!("  GET  /ping                  - Liveness check");
    println!("  GET  /health                - Readiness check (storage)");
}
