//! Key-value cache with per-key expiry.
//!
//! Holds refresh tokens and blacklist entries. Expiry is the cache's job; nothing
//! in the session core sweeps old keys.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod r#trait;

pub use in_memory::InMemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;
pub use r#trait::{CacheError, KeyValueCache};
