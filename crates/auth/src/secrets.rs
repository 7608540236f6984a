//! Opaque refresh tokens and the digest used for blacklist keys.

use core::fmt;
use core::str::FromStr;

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

use stars_core::UserId;

const SECRET_BYTES: usize = 32;

/// Hex-encoded SHA-256 of a raw token.
pub fn token_digest(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshTokenError {
    #[error("malformed refresh token")]
    Malformed,
}

/// A refresh token bound to its owner: `<user-id>.<64 hex chars>`.
///
/// The secret part is 32 bytes from the thread-local CSPRNG.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken {
    user_id: UserId,
    secret: String,
}

impl RefreshToken {
    pub fn generate(user_id: UserId) -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self {
            user_id,
            secret: hex::encode(bytes),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn parse(raw: &str) -> Result<Self, RefreshTokenError> {
        let (id, secret) = raw.split_once('.').ok_or(RefreshTokenError::Malformed)?;
        let user_id = UserId::from_str(id).map_err(|_| RefreshTokenError::Malformed)?;
        // Only the canonical decimal form: no sign, no leading zeros.
        if user_id.to_string() != id {
            return Err(RefreshTokenError::Malformed);
        }

        let well_formed = secret.len() == SECRET_BYTES * 2
            && secret.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(RefreshTokenError::Malformed);
        }

        Ok(Self {
            user_id,
            secret: secret.to_string(),
        })
    }
}

impl fmt::Display for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.user_id, self.secret)
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("user_id", &self.user_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_lowercase_hex() {
        let d = token_digest("abc");
        assert_eq!(
            d,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(token_digest("abc"), d);
        assert_ne!(token_digest("abd"), d);
    }

    #[test]
    fn generated_token_round_trips_through_text() {
        let token = RefreshToken::generate(UserId::new(42));
        let text = token.to_string();

        assert!(text.starts_with("42."));
        assert_eq!(text.len(), "42.".len() + 64);
        assert_eq!(RefreshToken::parse(&text), Ok(token));
    }

    #[test]
    fn generated_tokens_are_unique() {
        let a = RefreshToken::generate(UserId::new(1));
        let b = RefreshToken::generate(UserId::new(1));
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_malformed_values() {
        let secret = "a".repeat(64);
        for raw in [
            String::new(),
            secret.clone(),
            format!("0.{secret}"),
            format!("-1.{secret}"),
            format!("x.{secret}"),
            format!("+1.{secret}"),
            format!("01.{secret}"),
            format!(" 1.{secret}"),
            "1.abc".to_string(),
            format!("1.{}", "A".repeat(64)),
            format!("1.{}", "g".repeat(64)),
        ] {
            assert_eq!(RefreshToken::parse(&raw), Err(RefreshTokenError::Malformed), "{raw}");
        }
    }

    #[test]
    fn debug_hides_secret() {
        let token = RefreshToken::generate(UserId::new(7));
        let debug = format!("{token:?}");
        assert!(!debug.contains(&token.to_string()[2..]));
    }
}
