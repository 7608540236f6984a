use tracing::{debug, instrument};

use stars_auth::{Permission, Role};
use stars_core::UserId;

use crate::credential_store::{CredentialStore, StoreError};

/// Roles and permission paths reachable from a user at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grants {
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

/// Derives a user's effective grants from the credential store.
///
/// Output keeps store order and is not deduplicated beyond what the joins give.
#[derive(Debug, Clone)]
pub struct PermissionResolver<S> {
    store: S,
}

impl<S: CredentialStore> PermissionResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Enabled roles of the user, then every non-empty path of each role's enabled menus.
    ///
    /// Any store failure aborts resolution; a partial grant set is never returned.
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn resolve(&self, user_id: UserId) -> Result<Grants, StoreError> {
        let roles = self.store.enabled_roles_for_user(user_id).await?;

        let mut grants = Grants {
            roles: Vec::with_capacity(roles.len()),
            permissions: Vec::new(),
        };

        for role in roles {
            let menus = self.store.enabled_menus_for_role(role.id).await?;
            grants.permissions.extend(
                menus
                    .into_iter()
                    .filter(|m| !m.path.is_empty())
                    .map(|m| Permission::new(m.path)),
            );
            grants.roles.push(Role::new(role.code));
        }

        debug!(
            roles = grants.roles.len(),
            permissions = grants.permissions.len(),
            "resolved grants"
        );
        Ok(grants)
    }
}
