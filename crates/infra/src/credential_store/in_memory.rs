use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use stars_auth::{Identity, UserStatus};
use stars_core::{MenuId, RoleId, UserId};

use super::r#trait::{CredentialStore, MenuRecord, RoleRecord, StoreError};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<Identity>,
    roles: Vec<RoleRecord>,
    menus: Vec<MenuRecord>,
    user_roles: Vec<(UserId, RoleId)>,
    role_menus: Vec<(RoleId, MenuId)>,
}

/// In-memory credential store.
///
/// Intended for tests/dev. Rows keep insertion order, which is the order
/// association lookups return them in.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    /// Insert or replace a user by id. Usernames stay unique.
    pub fn upsert_user(&self, identity: Identity) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables
            .users
            .iter()
            .any(|u| u.username == identity.username && u.id != identity.id)
        {
            return Err(StoreError::Corrupt(format!(
                "username '{}' already taken",
                identity.username
            )));
        }
        match tables.users.iter_mut().find(|u| u.id == identity.id) {
            Some(existing) => *existing = identity,
            None => tables.users.push(identity),
        }
        Ok(())
    }

    pub fn upsert_role(&self, role: RoleRecord) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        match tables.roles.iter_mut().find(|r| r.id == role.id) {
            Some(existing) => *existing = role,
            None => tables.roles.push(role),
        }
        Ok(())
    }

    pub fn upsert_menu(&self, menu: MenuRecord) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        match tables.menus.iter_mut().find(|m| m.id == menu.id) {
            Some(existing) => *existing = menu,
            None => tables.menus.push(menu),
        }
        Ok(())
    }

    pub fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.user_roles.contains(&(user_id, role_id)) {
            tables.user_roles.push((user_id, role_id));
        }
        Ok(())
    }

    pub fn grant_menu(&self, role_id: RoleId, menu_id: MenuId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.role_menus.contains(&(role_id, menu_id)) {
            tables.role_menus.push((role_id, menu_id));
        }
        Ok(())
    }

    pub fn set_user_status(&self, user_id: UserId, status: UserStatus) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::UserNotFound(user_id))?;
        user.status = status;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        let tables = self.read()?;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<Identity>, StoreError> {
        let tables = self.read()?;
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn enabled_roles_for_user(&self, user_id: UserId) -> Result<Vec<RoleRecord>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, role_id)| tables.roles.iter().find(|r| r.id == *role_id))
            .filter(|r| r.enabled)
            .cloned()
            .collect())
    }

    async fn enabled_menus_for_role(&self, role_id: RoleId) -> Result<Vec<MenuRecord>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .role_menus
            .iter()
            .filter(|(r, _)| *r == role_id)
            .filter_map(|(_, menu_id)| tables.menus.iter().find(|m| m.id == *menu_id))
            .filter(|m| m.enabled)
            .cloned()
            .collect())
    }

    async fn update_last_login(&self, user_id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::UserNotFound(user_id))?;
        user.last_login_at = Some(at);
        Ok(())
    }

    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::UserNotFound(user_id))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}
