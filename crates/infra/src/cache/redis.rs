//! Redis-backed cache.
//!
//! A [`ConnectionManager`] is opened at startup and cloned per command. It
//! reconnects on its own after the server restarts or the link drops.

use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client, Script};
use tracing::{debug, info, instrument};

use super::r#trait::{CacheError, KeyValueCache};

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

// GET + DEL in one server-side step.
const DELETE_IF_EQUALS: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connect and verify connectivity with `PING`, all within `timeout`.
    #[instrument(skip(redis_url), err)]
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(|e| CacheError::Connection(e.to_string()))?;

        let cache = tokio::time::timeout(timeout, async {
            let conn = ConnectionManager::new(client)
                .await
                .map_err(|e| CacheError::Connection(e.to_string()))?;
            let cache = Self { conn };
            cache.ping().await?;
            Ok::<_, CacheError>(cache)
        })
        .await
        .map_err(|_| CacheError::Timeout(timeout))??;

        info!("redis cache connected");
        Ok(cache)
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        debug!("redis ping ok");
        Ok(())
    }
}

fn command_error(err: ::redis::RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        CacheError::Connection(err.to_string())
    } else {
        CacheError::Command(err.to_string())
    }
}

#[async_trait::async_trait]
impl KeyValueCache for RedisCache {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // SETEX rejects a zero expiry and anything past i64::MAX.
        let seconds = ttl.as_secs().max(1);
        if seconds > i64::MAX as u64 {
            return Err(CacheError::Command(format!("expiry out of range: {ttl:?}")));
        }
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(command_error)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(command_error)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(key).await.map_err(command_error)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(command_error)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let removed: i64 = Script::new(DELETE_IF_EQUALS)
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(removed == 1)
    }
}
