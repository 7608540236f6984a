use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use crate::app::dto::HealthResponse;
use crate::app::services::AppServices;

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        message: "Service is running",
    })
}

/// GET /system/config
pub async fn config(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(services.settings.clone())
}
