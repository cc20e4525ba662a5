//! Authentication backend for internal services.
//!
//! Verifies user credentials, registers users and calling applications, and
//! issues short-lived tokens signed with the calling application's secret.
//! The gRPC transport, configuration loading and binaries sit behind the
//! `server` feature; the domain core and stores are always available.

/// Auth service orchestration.
pub mod auth;
/// Password hashing and token issuance.
pub mod crypto;
/// Error types.
pub mod error;
/// User and app stores.
pub mod storage;

#[cfg(feature = "server")]
/// gRPC transport and configuration.
pub mod server;

#[cfg(feature = "server")]
/// Generated protobuf types and gRPC service stubs.
pub mod proto {
    tonic::include_proto!("auth");
}

pub use auth::{AuthService, AuthSettings};
pub use crypto::{Claims, HashedPassword, TokenIssuer};
pub use error::{Error, Result};
pub use storage::{App, AppStore, MemoryStore, PgStore, StorageError, User, UserStore};
