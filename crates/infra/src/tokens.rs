//! Refresh-token and blacklist bookkeeping on top of a [`KeyValueCache`].

use std::time::Duration;

use stars_auth::{token_digest, RefreshToken};
use stars_core::UserId;

use crate::cache::{CacheError, KeyValueCache};

const BLACKLIST_SENTINEL: &str = "1";

/// `blacklist:<hex-sha256(raw token)>`
pub fn blacklist_key(raw_token: &str) -> String {
    format!("blacklist:{}", token_digest(raw_token))
}

/// `refresh_token:<user-id>`
pub fn refresh_token_key(user_id: UserId) -> String {
    format!("refresh_token:{user_id}")
}

/// Cache-backed ledger of live refresh tokens and revoked session tokens.
#[derive(Debug, Clone)]
pub struct TokenLedger<C> {
    cache: C,
}

impl<C: KeyValueCache> TokenLedger<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    /// Make `token` the one live refresh token for its owner.
    pub async fn store_refresh_token(&self, token: &RefreshToken, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .set_ex(&refresh_token_key(token.user_id()), &token.to_string(), ttl)
            .await
    }

    /// Spend `presented` if it is exactly the live refresh token of `user_id`.
    ///
    /// Check and removal are one atomic step, so a token is spent at most once.
    pub async fn consume_refresh_token(&self, user_id: UserId, presented: &str) -> Result<bool, CacheError> {
        self.cache
            .delete_if_equals(&refresh_token_key(user_id), presented)
            .await
    }

    pub async fn revoke_refresh_token(&self, user_id: UserId) -> Result<(), CacheError> {
        self.cache.delete(&refresh_token_key(user_id)).await
    }

    pub async fn blacklist(&self, raw_token: &str, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .set_ex(&blacklist_key(raw_token), BLACKLIST_SENTINEL, ttl)
            .await
    }

    pub async fn is_blacklisted(&self, raw_token: &str) -> Result<bool, CacheError> {
        self.cache.exists(&blacklist_key(raw_token)).await
    }
}
