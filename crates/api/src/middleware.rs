//! Request guard: bearer token, signature/expiry, then revocation.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, error};

use stars_auth::{Principal, TokenValidator};
use stars_infra::TokenLedger;

use crate::app::errors;
use crate::app::services::DynCache;
use crate::context::{PrincipalContext, RawToken};

#[derive(Clone)]
pub struct AuthState {
    pub validator: Arc<dyn TokenValidator>,
    pub ledger: TokenLedger<DynCache>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())
        .ok_or_else(|| errors::unauthenticated("missing or malformed authorization header"))?
        .to_string();

    // Expired or forged tokens never reach the cache.
    let claims = state.validator.validate(&token, Utc::now()).map_err(|e| {
        debug!(error = %e, "rejected session token");
        errors::unauthenticated("invalid or expired token")
    })?;

    match state.ledger.is_blacklisted(&token).await {
        Ok(false) => {}
        Ok(true) => {
            debug!(user_id = %claims.user_id, "rejected revoked session token");
            return Err(errors::unauthenticated("token has been revoked"));
        }
        Err(e) => {
            error!(error = %e, "blacklist lookup failed");
            return Err(errors::internal_error());
        }
    }

    req.extensions_mut()
        .insert(PrincipalContext::new(Principal::from_claims(claims)));
    req.extensions_mut().insert(RawToken::new(token));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
