//! HTTP handlers and route configuration.

mod auth;
mod health;
mod posts;


use actix_web::{error::JsonPayloadError, web};

use crate::middleware::error::AppError;

/// Largest accepted JSON request body.
const JSON_LIMIT_BYTES: usize = 10 * 1024;

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT_BYTES)
        .error_handler(|err: JsonPayloadError, _req| {
            AppError::BadRequest(format!("Invalid JSON body: {}", err)).into()
        })
}

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        // Public routes
        .route("/health", web::get().to(health::health_check))
        .route("/register", web::post().to(auth::register))
        .route("/login", web::post().to(auth::login))
        .route("/logout", web::post().to(auth::logout))
        // Session routes
        .route("/profile", web::get().to(auth::profile))
        .service(
            web::resource("/post")
                .route(web::get().to(posts::list_posts))
                .route(web::post().to(posts::create_post))
                .route(web::put().to(posts::update_post)),
        )
        .route("/post/{id}", web::get().to(posts::get_post));
}
