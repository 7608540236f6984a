use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache command error: {0}")]
    Command(String),

    #[error("cache connectivity check timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait::async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Store `value` under `key`, replacing any previous value. The key expires after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Atomically remove `key` if it currently holds `expected`.
    /// Returns whether the key was removed.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError>;
}

#[async_trait::async_trait]
impl<C> KeyValueCache for Arc<C>
where
    C: KeyValueCache + ?Sized,
{
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        (**self).set_ex(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        (**self).exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        (**self).delete(key).await
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        (**self).delete_if_equals(key, expected).await
    }
}
