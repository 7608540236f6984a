//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/cache selection and session service construction
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::any::Any;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    response::Response,
    Extension, Router,
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, BootstrapError};

/// Prefix all routes are nested under.
pub const API_PREFIX: &str = "/api/v1";

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, BootstrapError> {
    let services = services::build_services(config).await?;
    Ok(with_http_layers(router(services), &config.cors_allowed_origins))
}

/// Router over already-built services.
pub fn router(services: AppServices) -> Router {
    let auth_state = middleware::AuthState {
        validator: services.codec.clone(),
        ledger: services.ledger.clone(),
    };
    let services = Arc::new(services);

    // Protected routes: require a valid, non-revoked session token.
    let protected = routes::protected_router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let public = routes::public_router().layer(Extension(services));

    Router::new().nest(API_PREFIX, public.merge(protected))
}

/// Outer layers shared by every route. A panicking handler answers with the
/// usual 500 envelope.
pub fn with_http_layers(router: Router, cors_origins: &[HeaderValue]) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins.to_vec())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "handler panicked");
    errors::internal_error()
}
