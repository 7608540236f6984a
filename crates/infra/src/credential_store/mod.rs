//! User, role and menu records plus their associations.
//!
//! The session core only reads through this boundary, apart from two writes:
//! the last-login timestamp and the password hash.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryCredentialStore;
pub use postgres::PostgresCredentialStore;
pub use r#trait::{CredentialStore, MenuRecord, RoleRecord, StoreError};
