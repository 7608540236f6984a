use stars_auth::{Permission, Principal, Role};
use stars_core::UserId;

/// Principal context for a request (authenticated identity + grants).
///
/// Inserted by the auth middleware; handlers behind it can rely on its presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn username(&self) -> &str {
        &self.principal.username
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.principal.permissions
    }
}

/// The bearer token exactly as presented, kept for logout.
#[derive(Clone, PartialEq, Eq)]
pub struct RawToken(String);

impl RawToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for RawToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RawToken(<redacted>)")
    }
}
