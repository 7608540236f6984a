//! Session token codec (HS256 JWT).
//!
//! The signing secret is handed in once at construction and never changes for the
//! lifetime of the process.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use stars_core::UserId;

use crate::claims::{validate_claims, SessionClaims, TokenValidationError};
use crate::{Permission, Role};

/// Default session lifetime (24h).
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Serialization failed while signing. Not expected in normal operation.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// Bad signature, wrong algorithm, or structurally invalid token.
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a raw session token and returns its claims.
///
/// The request guard depends on this seam rather than on the concrete codec.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError>;
}

/// A freshly signed session token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: SessionClaims,
}

impl IssuedToken {
    /// Seconds between issuance and expiry.
    pub fn expires_in(&self) -> i64 {
        self.claims.exp - self.claims.iat
    }
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    session_lifetime: Duration,
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .field("session_lifetime", &self.session_lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], session_lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Temporal checks run in `validate_claims` against an explicit clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "nbf", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            session_lifetime,
        }
    }

    pub fn session_lifetime(&self) -> Duration {
        self.session_lifetime
    }

    /// Sign a new session token valid from now for the configured lifetime.
    pub fn issue(
        &self,
        user_id: UserId,
        username: &str,
        roles: Vec<Role>,
        permissions: Vec<Permission>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, username, roles, permissions, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: UserId,
        username: &str,
        roles: Vec<Role>,
        permissions: Vec<Permission>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let iat = now.timestamp();
        let lifetime = i64::try_from(self.session_lifetime.as_secs())
            .map_err(|_| TokenError::Signing("session lifetime out of range".to_string()))?;

        let claims = SessionClaims {
            user_id,
            username: username.to_string(),
            roles,
            permissions,
            iat,
            nbf: iat,
            exp: iat.saturating_add(lifetime),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    /// Verify signature and time window against the wall clock.
    pub fn parse(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.parse_at(token, Utc::now())
    }

    pub fn parse_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl TokenValidator for TokenCodec {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        self.parse_at(token, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"test-secret", DEFAULT_SESSION_LIFETIME)
    }

    #[test]
    fn issue_then_parse_carries_identity_and_grants() {
        let codec = codec();
        let issued = codec
            .issue(
                UserId::new(1),
                "admin",
                vec![Role::ADMIN],
                vec![Permission::new("/system"), Permission::new("/system/users")],
            )
            .unwrap();

        let claims = codec.parse(&issued.token).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(issued.expires_in(), 24 * 60 * 60);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let issued = codec()
            .issue(UserId::new(1), "admin", vec![], vec![])
            .unwrap();
        let other = TokenCodec::new(b"another-secret", DEFAULT_SESSION_LIFETIME);

        assert!(matches!(other.parse(&issued.token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(codec().parse("not.a.jwt"), Err(TokenError::Invalid(_))));
        assert!(matches!(codec().parse(""), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let issued = codec()
            .issue(UserId::new(2), "alice", vec![Role::new("user")], vec![])
            .unwrap();
        let mut parts: Vec<String> = issued.token.split('.').map(str::to_string).collect();
        // Re-sign nothing, just swap in the payload of a token for another user.
        let forged = codec()
            .issue(UserId::new(1), "admin", vec![Role::ADMIN], vec![])
            .unwrap();
        parts[1] = forged.token.split('.').nth(1).unwrap().to_string();

        assert!(matches!(codec().parse(&parts.join(".")), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn expired_token_rejected() {
        let codec = codec();
        let issued_at = Utc::now() - ChronoDuration::hours(25);
        let issued = codec
            .issue_at(UserId::new(1), "admin", vec![], vec![], issued_at)
            .unwrap();

        assert_eq!(
            codec.parse(&issued.token),
            Err(TokenError::Claims(TokenValidationError::Expired))
        );
    }

    #[test]
    fn future_token_not_yet_valid() {
        let codec = codec();
        let issued_at = Utc::now() + ChronoDuration::minutes(10);
        let issued = codec
            .issue_at(UserId::new(1), "admin", vec![], vec![], issued_at)
            .unwrap();

        assert_eq!(
            codec.parse(&issued.token),
            Err(TokenError::Claims(TokenValidationError::NotYetValid))
        );
    }

    #[test]
    fn validator_trait_uses_supplied_clock() {
        let codec = codec();
        let now = Utc::now();
        let issued = codec
            .issue_at(UserId::new(1), "admin", vec![], vec![], now)
            .unwrap();
        let validator: &dyn TokenValidator = &codec;

        assert!(validator.validate(&issued.token, now).is_ok());
        assert!(validator
            .validate(&issued.token, now + ChronoDuration::hours(24))
            .is_err());
    }
}
