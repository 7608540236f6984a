//! Default accounts and grants for a fresh in-memory deployment.
//!
//! Mirrors the bootstrap migration: an `admin` account holding the `admin` role,
//! which is granted every menu under `/system`.

use thiserror::Error;
use tracing::info;

use stars_auth::password::{self, PasswordError};
use stars_auth::{Identity, UserStatus};
use stars_core::{MenuId, RoleId, UserId};

use crate::credential_store::{InMemoryCredentialStore, MenuRecord, RoleRecord, StoreError};

pub const ADMIN_USER_ID: UserId = UserId::new(1);
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

pub const ADMIN_ROLE_ID: RoleId = RoleId::new(1);
pub const USER_ROLE_ID: RoleId = RoleId::new(2);

const SYSTEM_MENU_ID: MenuId = MenuId::new(1);

const MENUS: [(i64, &str, &str); 5] = [
    (1, "系统管理", "/system"),
    (2, "用户管理", "/system/users"),
    (3, "角色管理", "/system/roles"),
    (4, "菜单管理", "/system/menus"),
    (5, "操作日志", "/system/logs"),
];

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

pub fn install_defaults(store: &InMemoryCredentialStore) -> Result<(), SeedError> {
    store.upsert_user(Identity {
        id: ADMIN_USER_ID,
        username: ADMIN_USERNAME.to_string(),
        password_hash: password::hash(ADMIN_PASSWORD)?,
        email: "admin@example.com".to_string(),
        nickname: "超级管理员".to_string(),
        avatar: String::new(),
        status: UserStatus::Enabled,
        last_login_at: None,
    })?;

    store.upsert_role(RoleRecord {
        id: ADMIN_ROLE_ID,
        name: "超级管理员".to_string(),
        code: "admin".to_string(),
        enabled: true,
    })?;
    store.upsert_role(RoleRecord {
        id: USER_ROLE_ID,
        name: "普通用户".to_string(),
        code: "user".to_string(),
        enabled: true,
    })?;
    store.assign_role(ADMIN_USER_ID, ADMIN_ROLE_ID)?;

    for (id, name, path) in MENUS {
        let id = MenuId::new(id);
        store.upsert_menu(MenuRecord {
            id,
            parent_id: (id != SYSTEM_MENU_ID).then_some(SYSTEM_MENU_ID),
            name: name.to_string(),
            path: path.to_string(),
            enabled: true,
        })?;
        store.grant_menu(ADMIN_ROLE_ID, id)?;
    }

    info!(username = ADMIN_USERNAME, "seeded default credentials");
    Ok(())
}
