//! # Quill API Server
//!
//! The main entry point for the Actix-web HTTP server.

use actix_cors::Cors;
use actix_files::Files;
use actix_web::http::{Method, header};
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;
mod upload;

use config::{AppConfig, TelemetryConfig};
use quill_infra::storage::UPLOADS_PREFIX;
use state::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env().context("loading configuration")?;

    tracing::info!("Starting Quill API Server on {}:{}", config.host, config.port);

    let state = web::Data::new(AppState::new(&config).await?);

    #[cfg(feature = "rate-limit")]
    let limiter: std::sync::Arc<dyn quill_core::ports::RateLimiter> =
        std::sync::Arc::new(quill_infra::InMemoryRateLimiter::new(quill_infra::RateLimitConfig {
            max_requests: config.rate_limit.max_requests,
            window: config.rate_limit.window,
        }));

    let upload_dir = config.upload_dir.clone();
    let frontend_url = config.frontend_url.clone();
    #[cfg(feature = "rate-limit")]
    let trust_proxy = config.rate_limit.trust_proxy;

    HttpServer::new(move || {
        let app = App::new()
            .app_data(state.clone())
            .service(Files::new(&format!("/{UPLOADS_PREFIX}"), upload_dir.clone()))
            .configure(handlers::configure_routes);

        #[cfg(feature = "rate-limit")]
        let app = app.wrap(middleware::rate_limit::RateLimitMiddleware::new(
            limiter.clone(),
            trust_proxy,
        ));

        app.wrap(cors(frontend_url.as_deref()))
            .wrap(TracingLogger::default())
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("binding {}:{}", config.host, config.port))?
    .run()
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Credentialed CORS for the single configured frontend origin. Without one,
/// cross-origin requests are refused.
fn cors(frontend_url: Option<&str>) -> Cors {
    let cors = Cors::default()
        .allowed_methods([Method::GET, Method::POST, Method::PUT])
        .allowed_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    match frontend_url {
        Some(origin) => cors.allowed_origin(origin).supports_credentials(),
        None => cors,
    }
}
