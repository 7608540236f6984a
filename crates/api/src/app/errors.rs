use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use stars_infra::SessionError;

pub fn session_error_to_response(err: SessionError) -> Response {
    match err {
        SessionError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid username or password",
        ),
        SessionError::AccountDisabled => {
            json_error(StatusCode::FORBIDDEN, "account_disabled", "account is disabled")
        }
        SessionError::Unauthenticated(reason) => unauthenticated(reason),
        SessionError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        SessionError::Signing(_) | SessionError::Hashing(_) | SessionError::StoreUnavailable(_) => {
            error!(error = %err, "session operation failed");
            internal_error()
        }
    }
}

pub fn json_rejection(rejection: JsonRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())
}

pub fn unauthenticated(message: impl Into<String>) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthenticated", message)
}

pub fn forbidden(message: impl Into<String>) -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn internal_error() -> Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
