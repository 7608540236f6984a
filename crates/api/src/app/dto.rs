use serde::{Deserialize, Serialize};

use stars_auth::{Permission, Role, UserProfile};
use stars_core::UserId;
use stars_infra::LoginOutcome;

use crate::context::PrincipalContext;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserProfile,
}

impl From<LoginOutcome> for TokenResponse {
    fn from(outcome: LoginOutcome) -> Self {
        Self {
            access_token: outcome.access_token,
            refresh_token: outcome.refresh_token,
            token_type: "Bearer",
            expires_in: outcome.expires_in,
            user: outcome.user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl From<&PrincipalContext> for PermissionsResponse {
    fn from(ctx: &PrincipalContext) -> Self {
        Self {
            user_id: ctx.user_id(),
            username: ctx.username().to_string(),
            roles: ctx.roles().to_vec(),
            permissions: ctx.permissions().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// Non-secret runtime settings exposed to administrators.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSettings {
    pub session_lifetime_secs: u64,
    pub refresh_lifetime_secs: u64,
    pub persistent_stores: bool,
}
