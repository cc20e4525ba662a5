/// Server configuration.
pub mod config;

/// gRPC service implementation.
pub mod service;

pub use config::ServerConfig;
pub use service::AuthServiceImpl;
