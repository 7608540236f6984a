use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use stars_auth::Identity;
use stars_core::{MenuId, RoleId, UserId};

/// A role row. `code` is what ends up in session tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: String,
    pub code: String,
    pub enabled: bool,
}

/// A menu row. The path doubles as the permission string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuRecord {
    pub id: MenuId,
    pub parent_id: Option<MenuId>,
    pub name: String,
    pub path: String,
    pub enabled: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable or the query failed.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    /// A row could not be mapped into a record.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("user {0} not found")]
    UserNotFound(UserId),
}

/// Credential storage boundary.
///
/// Association lookups return only enabled rows, in store order.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<Identity>, StoreError>;

    async fn enabled_roles_for_user(&self, user_id: UserId) -> Result<Vec<RoleRecord>, StoreError>;

    async fn enabled_menus_for_role(&self, role_id: RoleId) -> Result<Vec<MenuRecord>, StoreError>;

    async fn update_last_login(&self, user_id: UserId, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        (**self).find_by_username(username).await
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<Identity>, StoreError> {
        (**self).find_by_id(user_id).await
    }

    async fn enabled_roles_for_user(&self, user_id: UserId) -> Result<Vec<RoleRecord>, StoreError> {
        (**self).enabled_roles_for_user(user_id).await
    }

    async fn enabled_menus_for_role(&self, role_id: RoleId) -> Result<Vec<MenuRecord>, StoreError> {
        (**self).enabled_menus_for_role(role_id).await
    }

    async fn update_last_login(&self, user_id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        (**self).update_last_login(user_id, at).await
    }

    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> Result<(), StoreError> {
        (**self).update_password_hash(user_id, password_hash).await
    }
}
