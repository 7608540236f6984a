//! Account records as the auth layer sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stars_core::UserId;

/// Account status. Stored as an integer code: `1` enabled, anything else disabled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum UserStatus {
    Enabled,
    Disabled,
}

impl UserStatus {
    pub const fn code(self) -> i32 {
        match self {
            Self::Enabled => 1,
            Self::Disabled => 0,
        }
    }
}

impl From<i32> for UserStatus {
    fn from(code: i32) -> Self {
        if code == 1 {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

impl From<UserStatus> for i32 {
    fn from(status: UserStatus) -> Self {
        status.code()
    }
}

/// A user account including its password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub nickname: String,
    pub avatar: String,
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn is_enabled(&self) -> bool {
        self.status == UserStatus::Enabled
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            status: self.status,
        }
    }
}

impl core::fmt::Debug for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("status", &self.status)
            .field("last_login_at", &self.last_login_at)
            .finish_non_exhaustive()
    }
}

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub nickname: String,
    pub avatar: String,
    pub status: UserStatus,
}
