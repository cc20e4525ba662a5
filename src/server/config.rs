use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;

use crate::AuthSettings;

/// Server configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Deployment label: `local`, `dev` or `prod`. Selects the log format.
    pub env: String,
    /// Hostname or IP address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
    /// Lifetime of issued tokens, in seconds.
    pub token_ttl_secs: u64,
    /// Per-request deadline enforced by the server, in seconds.
    pub request_timeout_secs: u64,
    /// Key callers must present to register apps.
    pub admin_key: String,
    /// Password hash/verify calls allowed to run at once.
    pub max_concurrent_hashes: usize,
    /// Database connection settings.
    pub storage: StorageSettings,
    /// Metrics exporter configuration.
    pub metrics: MetricsSettings,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("env", &self.env)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_concurrent_hashes", &self.max_concurrent_hashes)
            .field("storage", &self.storage)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

/// PostgreSQL connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl StorageSettings {
    /// Builds connection options for the pool.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.dbname)
    }
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("dbname", &self.dbname)
            .field("max_connections", &self.max_connections)
            .finish_non_exhaustive()
    }
}

/// Metrics exporter settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics export is enabled.
    pub enabled: bool,
    /// Hostname or IP address for metrics server.
    pub host: String,
    /// Port number for metrics server.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            env: "local".to_string(),
            host: "127.0.0.1".to_string(),
            port: 44044,
            token_ttl_secs: 7 * 60 * 60,
            request_timeout_secs: 10,
            admin_key: String::new(),
            max_concurrent_hashes: 16,
            storage: StorageSettings {
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: String::new(),
                dbname: "auth".to_string(),
                max_connections: 10,
            },
            metrics: MetricsSettings {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 9090,
            },
        }
    }
}

impl ServerConfig {
    /// Loads configuration from defaults, a TOML file, `.env` and the environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables with `AUTH_` prefix; nested keys use `__`
    ///    (e.g. `AUTH_STORAGE__HOST=db`)
    /// 2. TOML configuration file, if it exists
    /// 3. Built-in defaults
    ///
    /// A `.env` file in the current directory or any parent is loaded into the
    /// environment first. The TOML path comes from `AUTH_CONFIG_PATH` and
    /// defaults to `config/server.toml`.
    ///
    /// # Environment Variable Examples
    /// ```bash
    /// AUTH_ENV=prod
    /// AUTH_PORT=44044
    /// AUTH_TOKEN_TTL_SECS=3600
    /// AUTH_ADMIN_KEY=change-me-to-something-long
    /// AUTH_STORAGE__HOST=postgres
    /// AUTH_STORAGE__PASSWORD=secret
    /// AUTH_METRICS__ENABLED=true
    /// ```
    ///
    /// # Errors
    /// Returns an error if a source is malformed or a value has the wrong type.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> figment::error::Result<Self> {
        // Attempt to load .env file (silently ignore if it doesn't exist)
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("AUTH_CONFIG_PATH")
            .unwrap_or_else(|_| "config/server.toml".to_string());

        Self::figment(&config_path).extract()
    }

    fn figment(config_path: &str) -> figment::Figment {
        use figment::Figment;
        use figment::providers::{Env, Format, Serialized, Toml};

        Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("AUTH_").ignore(&["CONFIG_PATH"]).split("__"))
    }

    /// Validates the configuration before the server starts.
    ///
    /// # Errors
    /// Returns an error message if the configuration is unusable.
    pub fn validate(&self) -> Result<(), String> {
        if self.admin_key.is_empty() {
            return Err("admin_key must be set".to_string());
        }

        if self.admin_key.len() < 16 {
            return Err("admin_key must be at least 16 characters".to_string());
        }

        if self.token_ttl_secs == 0 {
            return Err("token_ttl_secs cannot be zero".to_string());
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs cannot be zero".to_string());
        }

        if self.max_concurrent_hashes == 0 {
            return Err("max_concurrent_hashes cannot be zero".to_string());
        }

        if self.storage.max_connections == 0 {
            return Err("storage.max_connections cannot be zero".to_string());
        }

        if !matches!(self.env.as_str(), "local" | "dev" | "prod") {
            return Err(format!(
                "env must be one of local, dev, prod (got '{}')",
                self.env
            ));
        }

        Ok(())
    }

    /// Converts host and port into a socket address.
    ///
    /// # Errors
    /// Returns an error if the host is not an IP address.
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Token lifetime.
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Per-request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Settings for [`AuthService`](crate::AuthService).
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            token_ttl: self.token_ttl(),
            admin_key: self.admin_key.clone(),
            max_concurrent_hashes: self.max_concurrent_hashes,
        }
    }
}

impl MetricsSettings {
    /// Converts host and port into a socket address for the metrics server.
    ///
    /// # Errors
    /// Returns an error if the host is not an IP address.
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
