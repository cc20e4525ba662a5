use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use grpc_auth::proto::auth_server::AuthServer;
use grpc_auth::server::{AuthServiceImpl, ServerConfig};
use grpc_auth::{AppStore, AuthService, MemoryStore, PgStore, UserStore};
use tokio::{signal, time};
use tonic::transport::Server;
use tonic_health::server::{HealthReporter, health_reporter};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DB_PROBE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "gRPC authentication server", long_about = None)]
#[command(version)]
struct Args {
    /// Keep users and apps in process memory instead of PostgreSQL
    #[arg(long, env = "IN_MEMORY", default_value = "false")]
    in_memory: bool,

    /// Apply database migrations before serving
    #[arg(long, env = "MIGRATE", default_value = "false")]
    migrate: bool,
}

/// `local` logs human-readable text at debug, `dev` JSON at debug and `prod`
/// JSON at info. `RUST_LOG` overrides the level.
fn init_tracing(env: &str) {
    let default_level = if env == "prod" { "info" } else { "debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());
    let registry = tracing_subscriber::registry().with(filter);

    if env == "local" {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing("local");
            error!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };

    init_tracing(&config.env);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {e}");
        return Err(format!("Invalid configuration: {e}").into());
    }

    info!(env = %config.env, "starting auth server");

    let database = if args.in_memory {
        warn!("Using in-memory stores; data is lost on exit");
        None
    } else {
        let store =
            PgStore::connect(config.storage.connect_options(), config.storage.max_connections)
                .await?;
        if args.migrate {
            store.migrate().await?;
            info!("Database migrations applied");
        }
        store.ping().await?;
        info!(storage = ?config.storage, "Connected to database");
        Some(store)
    };

    let (users, apps): (Arc<dyn UserStore>, Arc<dyn AppStore>) = match &database {
        Some(store) => (Arc::new(store.clone()), Arc::new(store.clone())),
        None => {
            let store = MemoryStore::new();
            (Arc::new(store.clone()), Arc::new(store))
        }
    };

    let auth = AuthService::new(users, apps, config.auth_settings());
    let service = AuthServiceImpl::new(auth);

    if config.metrics.enabled {
        let metrics_addr = config.metrics.addr()?;
        tokio::spawn(async move {
            if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
            {
                error!("Failed to start metrics server: {e}");
            } else {
                info!("Metrics server started on {metrics_addr}");
            }
        });
    }

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<AuthServer<AuthServiceImpl>>()
        .await;

    if let Some(store) = database.clone() {
        let mut reporter = health_reporter.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(DB_PROBE_INTERVAL);
            loop {
                interval.tick().await;
                match store.ping().await {
                    Ok(()) => {
                        reporter
                            .set_serving::<AuthServer<AuthServiceImpl>>()
                            .await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Database health check failed");
                        reporter
                            .set_not_serving::<AuthServer<AuthServiceImpl>>()
                            .await;
                    }
                }
            }
        });
    }

    let addr = config.addr()?;
    info!(
        %addr,
        token_ttl_secs = config.token_ttl_secs,
        metrics = config.metrics.enabled,
        "gRPC server listening"
    );

    Server::builder()
        .timeout(config.request_timeout())
        .add_service(health_service)
        .add_service(AuthServer::new(service))
        .serve_with_shutdown(addr, shutdown_signal(health_reporter))
        .await?;

    if let Some(store) = database {
        store.close().await;
    }

    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal(mut health_reporter: HealthReporter) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    health_reporter
        .set_not_serving::<AuthServer<AuthServiceImpl>>()
        .await;

    info!("Initiating graceful shutdown (allowing in-flight requests to complete)");
}
