use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role code used for RBAC (e.g. `"admin"`, `"user"`).
///
/// Roles are opaque strings at this layer. The only code with built-in meaning is
/// [`Role::ADMIN`], which grants unrestricted access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Global override role.
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == Self::ADMIN.as_str()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
