use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app::dto::{
    LoginRequest, PermissionsResponse, RefreshRequest, TokenResponse, UpdatePasswordRequest,
};
use crate::app::{errors, services::AppServices};
use crate::context::{PrincipalContext, RawToken};

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    if req.username.trim().is_empty() || req.password.is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "username and password are required",
        );
    }

    match services.sessions.login(req.username.trim(), &req.password).await {
        Ok(outcome) => (StatusCode::OK, Json(TokenResponse::from(outcome))).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

/// POST /auth/refresh
pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.sessions.refresh(&req.refresh_token).await {
        Ok(outcome) => (StatusCode::OK, Json(TokenResponse::from(outcome))).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

/// POST /auth/logout
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(token): Extension<RawToken>,
) -> Response {
    match services
        .sessions
        .logout(principal.user_id(), token.as_str())
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({}))).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

/// GET /auth/user
pub async fn current_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services.sessions.current_user(principal.user_id()).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

/// PUT /auth/password
pub async fn update_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services
        .sessions
        .update_password(principal.user_id(), &req.old_password, &req.new_password)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({}))).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

/// GET /auth/permissions
///
/// Grants as embedded in the presented token, not re-resolved.
pub async fn permissions(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(PermissionsResponse::from(&principal))
}
