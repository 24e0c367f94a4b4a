//! Listener providers.
//!
//! # Responsibilities
//! - Model the two start modes as implementations of one capability
//! - Bind the TCP listener the HTTP server accepts on
//! - Hand the matching private-network client to the handlers

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ListenerConfig, TailnetConfig, TimeoutConfig};
use crate::tailnet::{LocalClient, NetworkClient, NetworkError};

/// How the process joined the network. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// Plain TCP listener; identity comes from the system daemon, if any.
    Standard,
    /// The process runs its own tailnet node.
    Embedded,
}

impl fmt::Display for ServeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeMode::Standard => write!(f, "standard"),
            ServeMode::Embedded => write!(f, "embedded"),
        }
    }
}

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address '{0}'")]
    Address(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("tailnet node has no usable address: {0}")]
    NoAddress(String),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Source of the listener and network client for one start mode.
#[async_trait]
pub trait ListenerProvider: Send + Sync {
    fn mode(&self) -> ServeMode;

    /// Client used by the health and identity paths.
    fn network_client(&self) -> Arc<dyn NetworkClient>;

    async fn listen(&self, config: &ListenerConfig) -> Result<TcpListener, ListenerError>;

    /// Release resources owned by the provider. Called after the server stops.
    async fn close(&self) {}
}

/// Bind a TCP listener and log where it ended up.
pub async fn bind_tcp(addr: SocketAddr) -> Result<TcpListener, ListenerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ListenerError::Bind { addr, source })?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}

/// Standard mode: bind the configured host and port directly.
pub struct StandardListener {
    client: Arc<LocalClient>,
}

impl StandardListener {
    /// Identity lookups go to the system daemon socket.
    pub fn new(tailnet: &TailnetConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            client: Arc::new(LocalClient::new(&tailnet.system_socket, timeouts.network())),
        }
    }
}

#[async_trait]
impl ListenerProvider for StandardListener {
    fn mode(&self) -> ServeMode {
        ServeMode::Standard
    }

    fn network_client(&self) -> Arc<dyn NetworkClient> {
        self.client.clone()
    }

    async fn listen(&self, config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
        let raw = format!("{}:{}", config.bind_host, config.port);
        let addr: SocketAddr = match config.bind_host.parse::<std::net::IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, config.port),
            Err(_) => raw.parse().map_err(|_| ListenerError::Address(raw.clone()))?,
        };
        bind_tcp(addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn standard_listener_binds_configured_port() {
        let provider = StandardListener::new(&TailnetConfig::default(), &TimeoutConfig::default());
        let config = ListenerConfig {
            bind_host: "127.0.0.1".into(),
            port: 0,
        };

        let listener = provider.listen(&config).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
        assert_eq!(provider.mode(), ServeMode::Standard);
    }

    #[tokio::test]
    async fn port_in_use_is_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let provider = StandardListener::new(&TailnetConfig::default(), &TimeoutConfig::default());
        let config = ListenerConfig {
            bind_host: "127.0.0.1".into(),
            port,
        };
        let err = provider.listen(&config).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }

    #[tokio::test]
    async fn rejects_unparseable_host() {
        let provider = StandardListener::new(&TailnetConfig::default(), &TimeoutConfig::default());
        let config = ListenerConfig {
            bind_host: "not a host".into(),
            port: 8080,
        };
        assert!(matches!(
            provider.listen(&config).await,
            Err(ListenerError::Address(_))
        ));
    }

    #[test]
    fn mode_display() {
        assert_eq!(ServeMode::Standard.to_string(), "standard");
        assert_eq!(ServeMode::Embedded.to_string(), "embedded");
    }
}
