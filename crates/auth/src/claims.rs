use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stars_core::UserId;

use crate::{Permission, Role};

/// Claims carried by a session token.
///
/// Timestamps are unix seconds so the standard `iat`/`nbf`/`exp` registered
/// claims stay interoperable with any JWT tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: UserId,
    pub username: String,

    /// Role codes granted at issuance.
    pub roles: Vec<Role>,

    /// Permission strings resolved at issuance. Never refreshed in place.
    pub permissions: Vec<Permission>,

    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Time left before natural expiry, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        let secs = self.exp.saturating_sub(now.timestamp()).max(0);
        std::time::Duration::from_secs(secs as u64)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the temporal claims against `now`.
///
/// Signature verification happens in [`crate::TokenCodec`]; this only looks at
/// the time window.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.nbf {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
