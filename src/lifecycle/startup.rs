//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order from a resolved config
//! - Pick the listener provider for the configured start mode
//! - Serve until shutdown, then release the provider
//!
//! # Design Decisions
//! - Fail fast on anything that prevents serving (bind, embedded node)
//! - An unreachable database is reported, not fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;

use crate::config::AppConfig;
use crate::database::{PgProductStore, ProductStore, StoreError};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::net::{ListenerError, ListenerProvider, StandardListener};
use crate::observability::metrics;
use crate::tailnet::{EmbeddedTailnet, TailnetError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to configure database: {0}")]
    Database(#[from] StoreError),

    #[error("failed to start embedded tailnet node: {0}")]
    Tailnet(#[from] TailnetError),

    #[error("failed to listen: {0}")]
    Listener(#[from] ListenerError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the application until a termination signal.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.listener.port,
        embedded = config.tailnet.embedded(),
        "tailnet-demo starting"
    );

    if config.observability.metrics_enabled {
        start_metrics(&config.observability.metrics_address)?;
    }

    let store = Arc::new(PgProductStore::connect_lazy(&config.database)?);
    check_database(store.as_ref(), &config).await;

    let provider = select_provider(&config).await?;
    let listener = match provider.listen(&config.listener).await {
        Ok(listener) => listener,
        Err(e) => {
            provider.close().await;
            return Err(e.into());
        }
    };

    let state = AppState::new(
        store,
        provider.network_client(),
        provider.mode(),
        config.timeouts,
    );
    let server = HttpServer::new(&config, state);

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let signals = shutdown.trigger_on_signal();

    tracing::info!(mode = %provider.mode(), "Serving");
    let served = server.run(listener, receiver).await;

    signals.abort();
    provider.close().await;
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Standard mode unless an auth key asks for an embedded node.
async fn select_provider(config: &AppConfig) -> Result<Box<dyn ListenerProvider>, StartupError> {
    if config.tailnet.embedded() {
        let node = EmbeddedTailnet::start(&config.tailnet, config.timeouts.network()).await?;
        Ok(Box::new(node))
    } else {
        tracing::info!(
            socket = %config.tailnet.system_socket,
            "No auth key configured, serving on a plain listener"
        );
        Ok(Box::new(StandardListener::new(
            &config.tailnet,
            &config.timeouts,
        )))
    }
}

fn start_metrics(address: &str) -> Result<(), StartupError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| StartupError::MetricsAddress(address.to_string()))?;
    metrics::init_metrics(addr)?;
    Ok(())
}

async fn check_database(store: &dyn ProductStore, config: &AppConfig) {
    match store.ping(config.timeouts.startup_ping()).await {
        Ok(()) => tracing::info!(host = %config.database.host, "Connected to database"),
        Err(e) => tracing::warn!(
            host = %config.database.host,
            error = %e,
            "Database not reachable at startup, continuing"
        ),
    }
}
