use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::r#trait::{CacheError, KeyValueCache};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory cache with lazy expiry: stale entries are dropped when touched.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left before `key` expires, if it is live.
    pub fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.expires_at - now))
    }

    fn live(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().map_err(poisoned)?;
            match entries.get(key) {
                Some(e) if e.expires_at > now => return Ok(Some(e.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().map_err(poisoned)?;
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> CacheError {
    CacheError::Command("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl KeyValueCache for InMemoryCache {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Command(format!("expiry out of range: {ttl:?}")))?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.live(key)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live(key)?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(poisoned)?;
        let matches = entries
            .get(key)
            .is_some_and(|e| e.expires_at > now && e.value == expected);
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }
}
