//! Store and service wiring, in-memory (dev/test) or persistent.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use stars_auth::TokenCodec;
use stars_infra::cache::{CacheError, InMemoryCache, KeyValueCache};
use stars_infra::credential_store::{CredentialStore, InMemoryCredentialStore};
use stars_infra::seed::{self, SeedError};
use stars_infra::{SessionPolicy, SessionService, TokenLedger};

use crate::app::dto::SystemSettings;
use crate::config::AppConfig;

pub type DynCredentialStore = Arc<dyn CredentialStore>;
pub type DynCache = Arc<dyn KeyValueCache>;
pub type Sessions = SessionService<DynCredentialStore, DynCache>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to seed in-memory stores: {0}")]
    Seed(#[from] SeedError),

    #[error("DATABASE_URL is required when USE_PERSISTENT_STORES=true")]
    MissingDatabaseUrl,

    #[error("database connection failed: {0}")]
    Database(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Clone)]
pub struct AppServices {
    pub sessions: Arc<Sessions>,
    pub codec: Arc<TokenCodec>,
    pub ledger: TokenLedger<DynCache>,
    pub settings: SystemSettings,
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, BootstrapError> {
    if config.use_persistent_stores {
        #[cfg(feature = "persistent")]
        {
            return build_persistent_services(config).await;
        }
        #[cfg(not(feature = "persistent"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but persistent feature not enabled, falling back to in-memory"
            );
        }
    }

    build_in_memory_services(config)
}

pub fn build_in_memory_services(config: &AppConfig) -> Result<AppServices, BootstrapError> {
    let store = Arc::new(InMemoryCredentialStore::new());
    seed::install_defaults(&store)?;
    info!("using seeded in-memory credential store and cache");

    Ok(assemble(config, store, Arc::new(InMemoryCache::new()), false))
}

#[cfg(feature = "persistent")]
async fn build_persistent_services(config: &AppConfig) -> Result<AppServices, BootstrapError> {
    use sqlx::postgres::PgPoolOptions;
    use stars_infra::{PostgresCredentialStore, RedisCache};

    let url = config
        .database_url
        .as_deref()
        .ok_or(BootstrapError::MissingDatabaseUrl)?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await
        .map_err(|e| BootstrapError::Database(e.to_string()))?;

    let cache = RedisCache::connect(&config.redis_url, config.cache_connect_timeout).await?;
    info!("using postgres credential store and redis cache");

    Ok(assemble(
        config,
        Arc::new(PostgresCredentialStore::new(pool)),
        Arc::new(cache),
        true,
    ))
}

fn assemble(
    config: &AppConfig,
    store: DynCredentialStore,
    cache: DynCache,
    persistent: bool,
) -> AppServices {
    let codec = Arc::new(TokenCodec::new(
        config.jwt_secret.as_bytes(),
        config.session_lifetime,
    ));
    let policy = SessionPolicy {
        refresh_lifetime: config.refresh_lifetime,
        ..SessionPolicy::default()
    };

    AppServices {
        sessions: Arc::new(SessionService::new(store, cache.clone(), codec.clone(), policy)),
        codec,
        ledger: TokenLedger::new(cache),
        settings: SystemSettings {
            session_lifetime_secs: config.session_lifetime.as_secs(),
            refresh_lifetime_secs: config.refresh_lifetime.as_secs(),
            persistent_stores: persistent,
        },
    }
}
