use serde::Serialize;
use thiserror::Error;

use stars_core::UserId;

use crate::{Permission, Role, SessionClaims};

/// The authenticated caller of a request, as carried by a validated session token.
///
/// Authorization decisions only look at what the token embeds. Grants changed after
/// issuance take effect on the next login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_claims(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            roles: claims.roles,
            permissions: claims.permissions,
        }
    }

    /// Holds the `admin` role or the `*` permission.
    pub fn has_unrestricted_access(&self) -> bool {
        self.roles.iter().any(Role::is_admin) || self.permissions.iter().any(Permission::is_wildcard)
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    MissingPermission(String),

    #[error("forbidden: missing role '{0}'")]
    MissingRole(String),
}

/// Flat membership check: exact match or unrestricted access. No hierarchy.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.has_unrestricted_access() || principal.has_permission(required) {
        Ok(())
    } else {
        Err(AuthzError::MissingPermission(required.as_str().to_string()))
    }
}

pub fn authorize_role(principal: &Principal, required: &Role) -> Result<(), AuthzError> {
    if principal.has_unrestricted_access() || principal.has_role(required) {
        Ok(())
    } else {
        Err(AuthzError::MissingRole(required.as_str().to_string()))
    }
}
