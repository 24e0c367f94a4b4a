//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the API and static routes
//! - Wire up middleware (request ID, tracing, timeout, metrics)
//! - Serve on a listener handed over by the network layer
//! - Drain in-flight requests on shutdown, bounded by the grace period

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::time::timeout;
use tower_http::{
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{AppConfig, TimeoutConfig};
use crate::database::ProductStore;
use crate::http::{handlers, request};
use crate::identity::IdentityResolver;
use crate::net::ServeMode;
use crate::observability::metrics;
use crate::tailnet::NetworkClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProductStore>,
    pub network: Arc<dyn NetworkClient>,
    pub identity: IdentityResolver,
    pub timeouts: TimeoutConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ProductStore>,
        network: Arc<dyn NetworkClient>,
        mode: ServeMode,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            identity: IdentityResolver::new(network.clone(), mode),
            store,
            network,
            timeouts,
        }
    }
}

/// HTTP server for the demo application.
pub struct HttpServer {
    router: Router,
    shutdown_grace: Duration,
}

impl HttpServer {
    pub fn new(config: &AppConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
            shutdown_grace: config.timeouts.shutdown_grace(),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The request ID layer is outermost so the trace span and every
    /// handler log see the same id.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let static_dir = PathBuf::from(&config.assets.static_dir);

        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/user", get(handlers::user))
            .route("/api/products", get(handlers::products))
            .route_layer(middleware::from_fn(metrics::track_requests))
            .route_service("/", ServeFile::new(static_dir.join("index.html")))
            .nest_service("/static", ServeDir::new(&static_dir))
            .with_state(state)
            .layer(TimeoutLayer::new(config.timeouts.request()))
            .layer(request::propagate_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request::make_span))
            .layer(request::set_request_id())
    }

    /// A clone of the router, for driving it without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until the shutdown channel fires, then drain.
    ///
    /// In-flight requests get `shutdown_grace` to finish. After that the
    /// serve task is aborted and whatever is left is dropped with the process.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let (drain_tx, drain_rx) = oneshot::channel::<()>();

        let mut serving = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = drain_rx.await;
                })
                .await
        });

        tokio::select! {
            result = &mut serving => {
                result.map_err(std::io::Error::other)??;
                tracing::info!("HTTP server stopped");
                return Ok(());
            }
            _ = shutdown.recv() => {
                tracing::info!(grace = ?self.shutdown_grace, "Shutdown requested, draining connections");
            }
        }

        let _ = drain_tx.send(());
        match timeout(self.shutdown_grace, &mut serving).await {
            Ok(result) => {
                result.map_err(std::io::Error::other)??;
                tracing::info!("HTTP server stopped");
            }
            Err(_) => {
                serving.abort();
                tracing::warn!(grace = ?self.shutdown_grace, "Server forced to shutdown");
            }
        }
        Ok(())
    }
}
