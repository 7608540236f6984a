//! Postgres-backed credential store.
//!
//! Reads the `xc_users`, `xc_roles`, `xc_menus`, `xc_user_roles` and
//! `xc_role_menus` tables. Soft-deleted rows (`deleted_at IS NOT NULL`) are
//! invisible, and status `1` means enabled.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | Database / Io / PoolTimedOut / PoolClosed / Tls | `Unavailable` |
//! | ColumnDecode / Decode / ColumnNotFound | `Corrupt` |
//! | Other | `Unavailable` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use stars_auth::{Identity, UserStatus};
use stars_core::{MenuId, RoleId, UserId};

use super::r#trait::{CredentialStore, MenuRecord, RoleRecord, StoreError};

const STATUS_ENABLED: i32 = 1;

const USER_COLUMNS: &str = "id, username, password, email, nickname, avatar, status, last_login_at";

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn find_user_where(&self, clause: &str, bind: UserKey<'_>) -> Result<Option<Identity>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM xc_users WHERE {clause} AND deleted_at IS NULL");
        let query = sqlx::query(&sql);
        let query = match bind {
            UserKey::Username(name) => query.bind(name),
            UserKey::Id(id) => query.bind(id.get()),
        };

        let row = query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;

        row.as_ref().map(identity_from_row).transpose()
    }
}

enum UserKey<'a> {
    Username(&'a str),
    Id(UserId),
}

#[async_trait::async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self), err)]
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        self.find_user_where("username = $1", UserKey::Username(username)).await
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<Identity>, StoreError> {
        self.find_user_where("id = $1", UserKey::Id(user_id)).await
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn enabled_roles_for_user(&self, user_id: UserId) -> Result<Vec<RoleRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.code, r.status
            FROM xc_roles r
            JOIN xc_user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
                AND r.status = $2
                AND r.deleted_at IS NULL
            ORDER BY r.id ASC
            "#,
        )
        .bind(user_id.get())
        .bind(STATUS_ENABLED)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("enabled_roles_for_user", e))?;

        rows.iter()
            .map(|row| {
                Ok(RoleRecord {
                    id: RoleId::new(row.try_get("id").map_err(corrupt)?),
                    name: row.try_get("name").map_err(corrupt)?,
                    code: row.try_get("code").map_err(corrupt)?,
                    enabled: row.try_get::<i32, _>("status").map_err(corrupt)? == STATUS_ENABLED,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(role_id = %role_id), err)]
    async fn enabled_menus_for_role(&self, role_id: RoleId) -> Result<Vec<MenuRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.parent_id, m.name, m.path, m.status
            FROM xc_menus m
            JOIN xc_role_menus rm ON rm.menu_id = m.id
            WHERE rm.role_id = $1
                AND m.status = $2
                AND m.deleted_at IS NULL
            ORDER BY m.sort ASC, m.id ASC
            "#,
        )
        .bind(role_id.get())
        .bind(STATUS_ENABLED)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("enabled_menus_for_role", e))?;

        rows.iter()
            .map(|row| {
                let parent: i64 = row.try_get("parent_id").map_err(corrupt)?;
                Ok(MenuRecord {
                    id: MenuId::new(row.try_get("id").map_err(corrupt)?),
                    // Root menus carry parent id 0.
                    parent_id: (parent > 0).then(|| MenuId::new(parent)),
                    name: row.try_get("name").map_err(corrupt)?,
                    path: row
                        .try_get::<Option<String>, _>("path")
                        .map_err(corrupt)?
                        .unwrap_or_default(),
                    enabled: row.try_get::<i32, _>("status").map_err(corrupt)? == STATUS_ENABLED,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn update_last_login(&self, user_id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE xc_users SET last_login_at = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id.get())
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_last_login", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(user_id));
        }
        Ok(())
    }

    #[instrument(skip(self, password_hash), fields(user_id = %user_id), err)]
    async fn update_password_hash(&self, user_id: UserId, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE xc_users SET password = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id.get())
        .bind(password_hash)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_password_hash", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(user_id));
        }
        Ok(())
    }
}

fn identity_from_row(row: &PgRow) -> Result<Identity, StoreError> {
    let optional = |column: &str| -> Result<String, StoreError> {
        Ok(row
            .try_get::<Option<String>, _>(column)
            .map_err(corrupt)?
            .unwrap_or_default())
    };

    Ok(Identity {
        id: UserId::new(row.try_get("id").map_err(corrupt)?),
        username: row.try_get("username").map_err(corrupt)?,
        password_hash: row.try_get("password").map_err(corrupt)?,
        email: optional("email")?,
        nickname: optional("nickname")?,
        avatar: optional("avatar")?,
        status: UserStatus::from(row.try_get::<i32, _>("status").map_err(corrupt)?),
        last_login_at: row.try_get("last_login_at").map_err(corrupt)?,
    })
}

fn corrupt(err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("{operation}: {err}"))
        }
        sqlx::Error::Database(db_err) => {
            StoreError::Unavailable(format!("database error in {operation}: {}", db_err.message()))
        }
        _ => StoreError::Unavailable(format!("{operation}: {err}")),
    }
}
