//! Authentication and authorization boundary.
//!
//! No HTTP and no storage here: session token signing and verification, password
//! hashing, refresh-token minting, and role/permission checks against a principal.

pub mod authorize;
pub mod claims;
pub mod identity;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod secrets;
pub mod token;

pub use authorize::{authorize, authorize_role, AuthzError, Principal};
pub use claims::{validate_claims, SessionClaims, TokenValidationError};
pub use identity::{Identity, UserProfile, UserStatus};
pub use password::PasswordError;
pub use permissions::Permission;
pub use roles::Role;
pub use secrets::{token_digest, RefreshToken, RefreshTokenError};
pub use token::{IssuedToken, TokenCodec, TokenError, TokenValidator};
