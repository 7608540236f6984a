//! Infrastructure layer: credential storage, key-value cache and the session
//! services built on top of them.

pub mod cache;
pub mod credential_store;
pub mod permission_resolver;
pub mod seed;
pub mod session;
pub mod tokens;

pub use cache::{CacheError, InMemoryCache, KeyValueCache};
pub use credential_store::{
    CredentialStore, InMemoryCredentialStore, MenuRecord, PostgresCredentialStore, RoleRecord,
    StoreError,
};
pub use permission_resolver::{Grants, PermissionResolver};
pub use session::{LoginOutcome, SessionError, SessionPolicy, SessionService};
pub use tokens::TokenLedger;

#[cfg(feature = "redis")]
pub use cache::RedisCache;
