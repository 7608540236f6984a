//! Login, refresh, logout and password change.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use stars_auth::password::{self, PasswordError};
use stars_auth::{Identity, RefreshToken, TokenCodec, TokenError, UserProfile};
use stars_core::UserId;

use crate::cache::{CacheError, KeyValueCache};
use crate::credential_store::{CredentialStore, StoreError};
use crate::permission_resolver::PermissionResolver;
use crate::tokens::TokenLedger;

/// The only message a rejected refresh gives back; the reason goes to the log.
pub const REFRESH_REJECTED: &str = "invalid or expired refresh token";

#[derive(Debug, Error)]
pub enum SessionError {
    /// Unknown user or wrong password. Both read the same to the caller.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<CacheError> for SessionError {
    fn from(err: CacheError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<TokenError> for SessionError {
    fn from(err: TokenError) -> Self {
        Self::Signing(err.to_string())
    }
}

impl From<PasswordError> for SessionError {
    fn from(err: PasswordError) -> Self {
        Self::Hashing(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub refresh_lifetime: Duration,
    pub min_password_len: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            refresh_lifetime: Duration::from_secs(7 * 24 * 60 * 60),
            min_password_len: 6,
        }
    }
}

/// Result of a successful login or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

pub struct SessionService<S, C> {
    store: S,
    resolver: PermissionResolver<S>,
    ledger: TokenLedger<C>,
    codec: Arc<TokenCodec>,
    policy: SessionPolicy,
}

impl<S, C> SessionService<S, C>
where
    S: CredentialStore + Clone,
    C: KeyValueCache,
{
    pub fn new(store: S, cache: C, codec: Arc<TokenCodec>, policy: SessionPolicy) -> Self {
        Self {
            resolver: PermissionResolver::new(store.clone()),
            store,
            ledger: TokenLedger::new(cache),
            codec,
            policy,
        }
    }

    pub fn ledger(&self) -> &TokenLedger<C> {
        &self.ledger
    }

    #[instrument(skip(self, password), err(level = "info"))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, SessionError> {
        let Some(identity) = self.store.find_by_username(username).await? else {
            verify_against_decoy(password).await?;
            info!("login rejected: unknown user");
            return Err(SessionError::InvalidCredentials);
        };
        if !identity.is_enabled() {
            info!(user_id = %identity.id, "login rejected: account disabled");
            return Err(SessionError::AccountDisabled);
        }
        if !verify_password(password, &identity.password_hash).await? {
            info!(user_id = %identity.id, "login rejected: wrong password");
            return Err(SessionError::InvalidCredentials);
        }

        let outcome = self.open_session(&identity).await?;

        if let Err(err) = self.store.update_last_login(identity.id, Utc::now()).await {
            warn!(user_id = %identity.id, error = %err, "failed to record last login");
        }

        info!(user_id = %identity.id, "login succeeded");
        Ok(outcome)
    }

    /// Trade the current refresh token for a new session and a new refresh token.
    ///
    /// The presented token is spent before anything else happens, so two
    /// concurrent calls with the same token cannot both succeed. Grants are
    /// resolved again, so role or menu changes take effect here.
    #[instrument(skip_all, err(level = "info"))]
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<LoginOutcome, SessionError> {
        let Ok(token) = RefreshToken::parse(raw_refresh_token) else {
            info!("refresh rejected: malformed token");
            return Err(SessionError::Unauthenticated(REFRESH_REJECTED));
        };
        let user_id = token.user_id();

        if !self
            .ledger
            .consume_refresh_token(user_id, raw_refresh_token)
            .await?
        {
            info!(user_id = %user_id, "refresh rejected: token not current");
            return Err(SessionError::Unauthenticated(REFRESH_REJECTED));
        }

        let Some(identity) = self.store.find_by_id(user_id).await? else {
            info!(user_id = %user_id, "refresh rejected: user no longer exists");
            return Err(SessionError::Unauthenticated(REFRESH_REJECTED));
        };
        if !identity.is_enabled() {
            info!(user_id = %user_id, "refresh rejected: account disabled");
            return Err(SessionError::AccountDisabled);
        }

        let outcome = self.open_session(&identity).await?;
        info!(user_id = %user_id, "session refreshed");
        Ok(outcome)
    }

    /// Revoke `raw_token` and the user's refresh token.
    ///
    /// Both steps run even if the first fails; the first error wins.
    #[instrument(skip(self, raw_token), fields(user_id = %user_id), err)]
    pub async fn logout(&self, user_id: UserId, raw_token: &str) -> Result<(), SessionError> {
        let ceiling = self.codec.session_lifetime();
        let ttl = match self.codec.parse(raw_token) {
            Ok(claims) => claims.remaining(Utc::now()).min(ceiling),
            Err(_) => ceiling,
        };

        let blacklisted = self.ledger.blacklist(raw_token, ttl).await;
        let revoked = self.ledger.revoke_refresh_token(user_id).await;
        blacklisted?;
        revoked?;

        info!("logged out");
        Ok(())
    }

    /// Already issued session tokens stay valid after a password change.
    #[instrument(skip(self, old_password, new_password), fields(user_id = %user_id), err(level = "info"))]
    pub async fn update_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), SessionError> {
        let identity = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(SessionError::Unauthenticated("user no longer exists"))?;

        if new_password.chars().count() < self.policy.min_password_len {
            return Err(SessionError::Validation(format!(
                "new password must be at least {} characters",
                self.policy.min_password_len
            )));
        }
        if !verify_password(old_password, &identity.password_hash).await? {
            return Err(SessionError::InvalidCredentials);
        }

        let hash = hash_password(new_password).await?;
        self.store.update_password_hash(user_id, &hash).await?;

        info!("password updated");
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), err(level = "info"))]
    pub async fn current_user(&self, user_id: UserId) -> Result<UserProfile, SessionError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(|identity| identity.profile())
            .ok_or(SessionError::Unauthenticated("user no longer exists"))
    }

    async fn open_session(&self, identity: &Identity) -> Result<LoginOutcome, SessionError> {
        let grants = self.resolver.resolve(identity.id).await?;
        let issued = self
            .codec
            .issue(identity.id, &identity.username, grants.roles, grants.permissions)?;

        let refresh = RefreshToken::generate(identity.id);
        self.ledger
            .store_refresh_token(&refresh, self.policy.refresh_lifetime)
            .await?;

        Ok(LoginOutcome {
            expires_in: issued.expires_in(),
            access_token: issued.token,
            refresh_token: refresh.to_string(),
            user: identity.profile(),
        })
    }
}

// Argon2 blocks for tens of milliseconds; run it on the blocking pool.
async fn verify_password(candidate: &str, stored_hash: &str) -> Result<bool, SessionError> {
    let candidate = candidate.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || password::verify(&candidate, &stored_hash))
        .await
        .map_err(|e| SessionError::Hashing(e.to_string()))
}

// Unknown usernames pay for one verification too, against a fixed hash.
async fn verify_against_decoy(candidate: &str) -> Result<(), SessionError> {
    let candidate = candidate.to_string();
    tokio::task::spawn_blocking(move || {
        password::verify(&candidate, decoy_hash());
    })
    .await
    .map_err(|e| SessionError::Hashing(e.to_string()))
}

fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| password::hash("decoy-password-never-matches").unwrap_or_default())
}

async fn hash_password(new_password: &str) -> Result<String, SessionError> {
    let new_password = new_password.to_string();
    tokio::task::spawn_blocking(move || password::hash(&new_password))
        .await
        .map_err(|e| SessionError::Hashing(e.to_string()))?
        .map_err(SessionError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use stars_auth::token::DEFAULT_SESSION_LIFETIME;
    use stars_auth::{Permission, Role, UserStatus};
    use stars_core::MenuId;

    use crate::cache::InMemoryCache;
    use crate::credential_store::{InMemoryCredentialStore, MenuRecord};
    use crate::seed::{self, ADMIN_PASSWORD, ADMIN_USERNAME, ADMIN_USER_ID};
    use crate::tokens::{blacklist_key, refresh_token_key};

    type Service = SessionService<Arc<InMemoryCredentialStore>, Arc<InMemoryCache>>;

    struct Fixture {
        store: Arc<InMemoryCredentialStore>,
        cache: Arc<InMemoryCache>,
        codec: Arc<TokenCodec>,
        service: Service,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryCredentialStore::new());
        seed::install_defaults(&store).unwrap();
        let cache = Arc::new(InMemoryCache::new());
        let codec = Arc::new(TokenCodec::new(b"session-test-secret", DEFAULT_SESSION_LIFETIME));
        let service = SessionService::new(
            store.clone(),
            cache.clone(),
            codec.clone(),
            SessionPolicy::default(),
        );
        Fixture {
            store,
            cache,
            codec,
            service,
        }
    }

    #[tokio::test]
    async fn login_embeds_resolved_grants() {
        let fx = fixture();
        let outcome = fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

        let claims = fx.codec.parse(&outcome.access_token).unwrap();
        let grants = PermissionResolver::new(fx.store.clone())
            .resolve(ADMIN_USER_ID)
            .await
            .unwrap();

        assert_eq!(claims.user_id, ADMIN_USER_ID);
        assert_eq!(claims.roles, grants.roles);
        assert_eq!(claims.permissions, grants.permissions);
        assert_eq!(outcome.expires_in, 86_400);
        assert_eq!(outcome.user.username, ADMIN_USERNAME);
    }

    #[tokio::test]
    async fn login_stores_refresh_token_and_last_login() {
        let fx = fixture();
        let outcome = fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

        let stored = fx.cache.get(&refresh_token_key(ADMIN_USER_ID)).await.unwrap();
        assert_eq!(stored.as_deref(), Some(outcome.refresh_token.as_str()));
        let ttl = fx.cache.ttl(&refresh_token_key(ADMIN_USER_ID)).unwrap().unwrap();
        assert!(ttl > Duration::from_secs(6 * 24 * 60 * 60));

        let identity = fx.store.find_by_id(ADMIN_USER_ID).await.unwrap().unwrap();
        assert!(identity.last_login_at.is_some());
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let fx = fixture();
        let unknown = fx.service.login("ghost", ADMIN_PASSWORD).await.unwrap_err();
        let wrong = fx.service.login(ADMIN_USERNAME, "nope").await.unwrap_err();

        assert!(matches!(unknown, SessionError::InvalidCredentials));
        assert!(matches!(wrong, SessionError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn disabled_account_cannot_login() {
        let fx = fixture();
        fx.store.set_user_status(ADMIN_USER_ID, UserStatus::Disabled).unwrap();

        let err = fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap_err();
        assert!(matches!(err, SessionError::AccountDisabled));
    }

    #[tokio::test]
    async fn second_login_invalidates_first_refresh_token() {
        let fx = fixture();
        let first = fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();
        let second = fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

        let err = fx.service.refresh(&first.refresh_token).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthenticated(_)));
        assert!(fx.service.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_rotates_and_reresolves_grants() {
        let fx = fixture();
        let login = fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

        let before = fx.codec.parse(&login.access_token).unwrap();
        assert!(!before.permissions.contains(&Permission::new("/reports")));

        fx.store
            .upsert_menu(MenuRecord {
                id: MenuId::new(100),
                parent_id: None,
                name: "Reports".to_string(),
                path: "/reports".to_string(),
                enabled: true,
            })
            .unwrap();
        fx.store.grant_menu(seed::USER_ROLE_ID, MenuId::new(100)).unwrap();
        fx.store.assign_role(ADMIN_USER_ID, seed::USER_ROLE_ID).unwrap();
        let refreshed = fx.service.refresh(&login.refresh_token).await.unwrap();

        assert_ne!(refreshed.refresh_token, login.refresh_token);
        let claims = fx.codec.parse(&refreshed.access_token).unwrap();
        assert!(claims.roles.contains(&Role::new("user")));
        assert!(claims.permissions.contains(&Permission::new("/reports")));

        // The consumed token cannot be replayed.
        assert!(fx.service.refresh(&login.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn refresh_rejections_share_one_message() {
        let fx = fixture();
        let login = fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();
        let stale = login.refresh_token.clone();
        fx.service.refresh(&login.refresh_token).await.unwrap();

        let orphan = RefreshToken::generate(UserId::new(404));
        fx.service
            .ledger()
            .store_refresh_token(&orphan, Duration::from_secs(60))
            .await
            .unwrap();

        for raw in ["garbage".to_string(), stale, orphan.to_string()] {
            let err = fx.service.refresh(&raw).await.unwrap_err();
            assert!(
                matches!(err, SessionError::Unauthenticated(REFRESH_REJECTED)),
                "{err}"
            );
        }
    }

    #[tokio::test]
    async fn concurrent_refreshes_spend_the_token_once() {
        let fx = fixture();
        let login = fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

        let (a, b) = tokio::join!(
            fx.service.refresh(&login.refresh_token),
            fx.service.refresh(&login.refresh_token),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[test]
    fn decoy_hash_is_a_real_hash_that_never_matches() {
        let decoy = decoy_hash();
        assert!(decoy.starts_with("$argon2"));
        assert!(!password::verify(ADMIN_PASSWORD, decoy));
        assert!(!password::verify("", decoy));
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_and_disabled_accounts() {
        let fx = fixture();
        assert!(matches!(
            fx.service.refresh("garbage").await,
            Err(SessionError::Unauthenticated(_))
        ));

        let login = fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();
        fx.store.set_user_status(ADMIN_USER_ID, UserStatus::Disabled).unwrap();
        assert!(matches!(
            fx.service.refresh(&login.refresh_token).await,
            Err(SessionError::AccountDisabled)
        ));
    }

    #[tokio::test]
    async fn logout_blacklists_token_and_drops_refresh_token() {
        let fx = fixture();
        let login = fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

        fx.service.logout(ADMIN_USER_ID, &login.access_token).await.unwrap();

        assert!(fx.service.ledger().is_blacklisted(&login.access_token).await.unwrap());
        let ttl = fx.cache.ttl(&blacklist_key(&login.access_token)).unwrap().unwrap();
        assert!(ttl <= DEFAULT_SESSION_LIFETIME);
        assert!(fx.cache.get(&refresh_token_key(ADMIN_USER_ID)).await.unwrap().is_none());
        assert!(fx.service.refresh(&login.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn logout_with_unparseable_token_uses_ceiling_ttl() {
        let fx = fixture();
        fx.service.logout(ADMIN_USER_ID, "not-a-token").await.unwrap();

        let ttl = fx.cache.ttl(&blacklist_key("not-a-token")).unwrap().unwrap();
        assert!(ttl > DEFAULT_SESSION_LIFETIME - Duration::from_secs(60));
    }

    /// Fails every write, counts attempted deletes.
    #[derive(Default)]
    struct FailingCache {
        deletes: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl KeyValueCache for FailingCache {
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Connection("down".to_string()))
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Connection("down".to_string()))
        }

        async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Connection("down".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            self.deletes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(CacheError::Command("delete refused".to_string()))
        }

        async fn delete_if_equals(&self, _key: &str, _expected: &str) -> Result<bool, CacheError> {
            Err(CacheError::Connection("down".to_string()))
        }
    }

    #[tokio::test]
    async fn logout_attempts_both_steps_and_reports_first_error() {
        let fx = fixture();
        let cache = Arc::new(FailingCache::default());
        let service = SessionService::new(
            fx.store.clone(),
            cache.clone(),
            fx.codec.clone(),
            SessionPolicy::default(),
        );

        let err = service.logout(ADMIN_USER_ID, "raw").await.unwrap_err();

        assert!(matches!(err, SessionError::StoreUnavailable(ref msg) if msg.contains("down")));
        assert_eq!(cache.deletes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn login_fails_when_refresh_token_cannot_be_stored() {
        let fx = fixture();
        let service = SessionService::new(
            fx.store.clone(),
            Arc::new(FailingCache::default()),
            fx.codec.clone(),
            SessionPolicy::default(),
        );

        assert!(matches!(
            service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await,
            Err(SessionError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn password_change_swaps_the_accepted_password() {
        let fx = fixture();
        fx.service
            .update_password(ADMIN_USER_ID, ADMIN_PASSWORD, "s3cret!")
            .await
            .unwrap();

        assert!(matches!(
            fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await,
            Err(SessionError::InvalidCredentials)
        ));
        assert!(fx.service.login(ADMIN_USERNAME, "s3cret!").await.is_ok());
    }

    #[tokio::test]
    async fn password_change_checks_old_password_and_length() {
        let fx = fixture();
        assert!(matches!(
            fx.service.update_password(ADMIN_USER_ID, "wrong", "long-enough").await,
            Err(SessionError::InvalidCredentials)
        ));
        assert!(matches!(
            fx.service.update_password(ADMIN_USER_ID, ADMIN_PASSWORD, "short").await,
            Err(SessionError::Validation(_))
        ));
        assert!(fx.service.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn current_user_returns_profile() {
        let fx = fixture();
        let profile = fx.service.current_user(ADMIN_USER_ID).await.unwrap();
        assert_eq!(profile.username, ADMIN_USERNAME);
        assert_eq!(profile.email, "admin@example.com");

        assert!(matches!(
            fx.service.current_user(UserId::new(404)).await,
            Err(SessionError::Unauthenticated(_))
        ));
    }
}
