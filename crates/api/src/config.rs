//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use thiserror::Error;

use stars_observability::LogFormat;

/// Used when `JWT_SECRET` is unset. Never acceptable outside local runs.
pub const DEV_JWT_SECRET: &str = "dev-secret";

const HOUR: u64 = 60 * 60;

/// Upper bound for token and refresh lifetimes (ten years).
pub const MAX_LIFETIME_HOURS: u64 = 10 * 365 * 24;

/// Browser origins allowed to call the API when `CORS_ALLOWED_ORIGINS` is unset.
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:5173"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub server_addr: SocketAddr,
    pub jwt_secret: String,
    pub session_lifetime: Duration,
    pub refresh_lifetime: Duration,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub cache_connect_timeout: Duration,
    pub log_format: LogFormat,
    pub cors_allowed_origins: Vec<HeaderValue>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server_addr", &self.server_addr)
            .field("jwt_secret", &"<redacted>")
            .field("session_lifetime", &self.session_lifetime)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .field("use_persistent_stores", &self.use_persistent_stores)
            .field("database_max_connections", &self.database_max_connections)
            .field("cache_connect_timeout", &self.cache_connect_timeout)
            .field("log_format", &self.log_format)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish_non_exhaustive()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            session_lifetime: Duration::from_secs(24 * HOUR),
            refresh_lifetime: Duration::from_secs(168 * HOUR),
            use_persistent_stores: false,
            database_url: None,
            database_max_connections: 100,
            redis_url: "redis://localhost:6379".to_string(),
            cache_connect_timeout: Duration::from_secs(5),
            log_format: LogFormat::Json,
            cors_allowed_origins: DEFAULT_CORS_ORIGINS
                .into_iter()
                .map(HeaderValue::from_static)
                .collect(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("SERVER_ADDR") {
            config.server_addr = v
                .parse()
                .map_err(|e| ConfigError::invalid("SERVER_ADDR", &v, e))?;
        }
        if let Some(v) = lookup("JWT_SECRET").filter(|v| !v.is_empty()) {
            config.jwt_secret = v;
        }
        if let Some(v) = lookup("JWT_EXPIRE_HOURS") {
            config.session_lifetime = hours("JWT_EXPIRE_HOURS", &v)?;
        }
        if let Some(v) = lookup("JWT_REFRESH_EXPIRE_HOURS") {
            config.refresh_lifetime = hours("JWT_REFRESH_EXPIRE_HOURS", &v)?;
        }
        if let Some(v) = lookup("USE_PERSISTENT_STORES") {
            config.use_persistent_stores = v
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("USE_PERSISTENT_STORES", &v, e))?;
        }
        config.database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty());
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.database_max_connections = v
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("DATABASE_MAX_CONNECTIONS", &v, e))?;
        }
        if let Some(v) = lookup("REDIS_URL").filter(|v| !v.is_empty()) {
            config.redis_url = v;
        }
        if let Some(v) = lookup("CACHE_CONNECT_TIMEOUT_SECS") {
            let secs: u64 = v
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("CACHE_CONNECT_TIMEOUT_SECS", &v, e))?;
            config.cache_connect_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            config.log_format = v
                .parse()
                .map_err(|e| ConfigError::invalid("LOG_FORMAT", &v, e))?;
        }
        if let Some(v) = lookup("CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = origins("CORS_ALLOWED_ORIGINS", &v)?;
        }

        Ok(config)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn hours(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let hours: u64 = raw
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, raw, e))?;
    if hours == 0 {
        return Err(ConfigError::invalid(key, raw, "must be at least 1"));
    }
    if hours > MAX_LIFETIME_HOURS {
        return Err(ConfigError::invalid(
            key,
            raw,
            format!("must be at most {MAX_LIFETIME_HOURS}"),
        ));
    }
    Ok(Duration::from_secs(hours * HOUR))
}

// Credentials are allowed cross-origin, so a wildcard origin is refused.
fn origins(key: &'static str, raw: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            if origin == "*" {
                return Err(ConfigError::invalid(key, raw, "wildcard origin is not allowed"));
            }
            HeaderValue::from_str(origin).map_err(|e| ConfigError::invalid(key, raw, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = from(&[]).unwrap();
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.session_lifetime, Duration::from_secs(86_400));
        assert_eq!(config.refresh_lifetime, Duration::from_secs(7 * 86_400));
        assert_eq!(config.cache_connect_timeout, Duration::from_secs(5));
        assert!(!config.use_persistent_stores);
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn overrides_are_applied() {
        let config = from(&[
            ("SERVER_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "prod-secret"),
            ("JWT_EXPIRE_HOURS", "2"),
            ("JWT_REFRESH_EXPIRE_HOURS", "48"),
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/stars"),
            ("LOG_FORMAT", "text"),
        ])
        .unwrap();

        assert_eq!(config.server_addr.to_string(), "127.0.0.1:9000");
        assert!(!config.uses_dev_secret());
        assert_eq!(config.session_lifetime, Duration::from_secs(2 * HOUR));
        assert_eq!(config.refresh_lifetime, Duration::from_secs(48 * HOUR));
        assert!(config.use_persistent_stores);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/stars"));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(matches!(
            from(&[("JWT_EXPIRE_HOURS", "abc")]),
            Err(ConfigError::Invalid { key: "JWT_EXPIRE_HOURS", .. })
        ));
        assert!(from(&[("JWT_EXPIRE_HOURS", "0")]).is_err());
        assert!(from(&[("DATABASE_MAX_CONNECTIONS", "-1")]).is_err());
        assert!(from(&[("USE_PERSISTENT_STORES", "yes")]).is_err());
    }

    #[test]
    fn lifetimes_are_bounded() {
        let max = MAX_LIFETIME_HOURS.to_string();
        let config = from(&[("JWT_REFRESH_EXPIRE_HOURS", max.as_str())]).unwrap();
        assert_eq!(config.refresh_lifetime, Duration::from_secs(MAX_LIFETIME_HOURS * HOUR));

        let over = (MAX_LIFETIME_HOURS + 1).to_string();
        assert!(matches!(
            from(&[("JWT_EXPIRE_HOURS", over.as_str())]),
            Err(ConfigError::Invalid { key: "JWT_EXPIRE_HOURS", .. })
        ));
        assert!(matches!(
            from(&[("JWT_REFRESH_EXPIRE_HOURS", "5000000000000000")]),
            Err(ConfigError::Invalid { key: "JWT_REFRESH_EXPIRE_HOURS", .. })
        ));
    }

    #[test]
    fn cors_origins_default_and_override() {
        let config = from(&[]).unwrap();
        assert_eq!(config.cors_allowed_origins.len(), 2);
        assert_eq!(config.cors_allowed_origins[1], "http://localhost:5173");

        let config = from(&[("CORS_ALLOWED_ORIGINS", "https://admin.example.com, ,http://a.test")]).unwrap();
        assert_eq!(config.cors_allowed_origins, vec![
            HeaderValue::from_static("https://admin.example.com"),
            HeaderValue::from_static("http://a.test"),
        ]);

        assert!(from(&[("CORS_ALLOWED_ORIGINS", "*")]).is_err());
        assert!(from(&[("CORS_ALLOWED_ORIGINS", "http://bad\norigin")]).is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let config = from(&[("JWT_SECRET", "hunter2")]).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
