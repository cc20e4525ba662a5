//! User and app persistence.
//!
//! Stores never check for existence before writing. Inserts go straight to the
//! backend and a uniqueness violation comes back as `UserExists` / `AppExists`,
//! so concurrent registrations of the same key cannot both succeed.

/// In-process stores.
pub mod memory;
/// PostgreSQL stores.
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::crypto::HashedPassword;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A registered user.
#[derive(Clone)]
pub struct User {
    /// Generated at creation, immutable.
    pub id: Uuid,
    /// Unique, stored lowercase.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: HashedPassword,
    /// Random per-user secret, immutable after creation.
    pub salt: String,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// A registered calling application.
#[derive(Clone)]
pub struct App {
    /// Generated at creation.
    pub id: Uuid,
    /// Unique human-readable name.
    pub name: String,
    /// Token signing secret.
    pub secret: String,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Storage-level failures. Every variant carries the tag of the operation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A user with this email already exists.
    #[error("{op}: user already exists")]
    UserExists { op: &'static str },

    /// No user with this email.
    #[error("{op}: user not found")]
    UserNotFound { op: &'static str },

    /// An app with this name already exists.
    #[error("{op}: app already exists")]
    AppExists { op: &'static str },

    /// No app with this id.
    #[error("{op}: app not found")]
    AppNotFound { op: &'static str },

    /// The backend failed (connectivity, corrupt row, pool exhaustion).
    #[error("{op}: {source}")]
    Backend {
        op: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result alias for store operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Persistence for users, keyed by email.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user and returns its new id. A per-user salt is generated here.
    async fn save(&self, email: &str, password_hash: &HashedPassword) -> StorageResult<Uuid>;

    /// Fetches a user by email.
    async fn get(&self, email: &str) -> StorageResult<User>;

    /// Removes a user by email and returns the removed id.
    async fn delete(&self, email: &str) -> StorageResult<Uuid>;
}

/// Persistence for apps, unique by name and addressed by id.
#[async_trait]
pub trait AppStore: Send + Sync {
    /// Inserts an app and returns its new id.
    async fn save(&self, name: &str, secret: &str) -> StorageResult<Uuid>;

    /// Fetches an app by id.
    async fn get(&self, id: Uuid) -> StorageResult<App>;

    /// Removes an app by id.
    async fn delete(&self, id: Uuid) -> StorageResult<()>;
}

/// Canonical form of an email for storage and lookup.
///
/// Emails compare case-insensitively; surrounding whitespace is ignored.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
