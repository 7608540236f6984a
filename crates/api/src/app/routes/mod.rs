use axum::{
    routing::{get, post, put},
    Router,
};

use stars_auth::Permission;

use crate::authz;

pub mod auth;
pub mod system;

/// Endpoints reachable without a session token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
}

/// Endpoints behind the auth middleware.
pub fn protected_router() -> Router {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/user", get(auth::current_user))
        .route("/auth/password", put(auth::update_password))
        .route("/auth/permissions", get(auth::permissions))
        .route(
            "/system/config",
            get(system::config).route_layer(axum::middleware::from_fn_with_state(
                Permission::new("/system"),
                authz::require_permission,
            )),
        )
}
