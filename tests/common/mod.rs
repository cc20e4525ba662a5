//! Common test utilities shared across integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use grpc_auth::{AuthService, AuthSettings, MemoryStore};

pub const ADMIN_KEY: &str = "integration-admin-key-0123456789";
pub const TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Initialize test tracing (call once at the beginning of tests).
///
/// Only logs from the library are shown. Subsequent calls are ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new("grpc_auth=debug");

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

/// Auth service over fresh in-memory stores. The store handle is returned so
/// tests can inspect what was written.
pub fn memory_service() -> (AuthService, MemoryStore) {
    let store = MemoryStore::new();
    let service = AuthService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        AuthSettings {
            token_ttl: TOKEN_TTL,
            admin_key: ADMIN_KEY.to_string(),
            max_concurrent_hashes: 4,
        },
    );

    (service, store)
}

/// Current Unix time in seconds.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
