//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration, resolved once at startup and immutable afterwards.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub listener: ListenerConfig,

    /// Relational store connection settings.
    pub database: DatabaseConfig,

    /// Private-network (tailnet) client settings.
    pub tailnet: TailnetConfig,

    /// Timeouts for dependency calls and shutdown.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Static front-end assets.
    pub assets: AssetsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to bind in standard mode.
    pub bind_host: String,

    /// HTTP listen port (both modes).
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database connection configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,

    /// Postgres ssl mode (`disable`, `prefer`, `require`, ...).
    pub ssl_mode: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// How long a handler may wait for a pooled connection.
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "demo".to_string(),
            ssl_mode: "disable".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 2_000,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .finish()
    }
}

/// Private-network client configuration.
///
/// The presence of `auth_key` selects embedded mode.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TailnetConfig {
    /// Pre-authorized key for the embedded node. Never logged.
    pub auth_key: Option<String>,

    /// Name the embedded node advertises on the tailnet.
    pub hostname: String,

    /// LocalAPI socket of the system daemon (standard mode).
    pub system_socket: String,

    /// Daemon binary used for the embedded node.
    pub tailscaled_path: String,

    /// CLI binary used to bring the embedded node up.
    pub tailscale_path: String,

    /// State directory of the embedded node; its socket lives here too.
    pub state_dir: String,

    /// Run the embedded node without a kernel TUN device.
    pub userspace_networking: bool,

    /// Deadline for the embedded node to reach the running state.
    pub startup_timeout_secs: u64,
}

impl TailnetConfig {
    /// Whether the service should start its own tailnet node.
    pub fn embedded(&self) -> bool {
        self.auth_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl Default for TailnetConfig {
    fn default() -> Self {
        Self {
            auth_key: None,
            hostname: "demo".to_string(),
            system_socket: "/var/run/tailscale/tailscaled.sock".to_string(),
            tailscaled_path: "tailscaled".to_string(),
            tailscale_path: "tailscale".to_string(),
            state_dir: "./tailnet-state".to_string(),
            userspace_networking: true,
            startup_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for TailnetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TailnetConfig")
            .field("auth_key", &self.auth_key.as_ref().map(|_| "<redacted>"))
            .field("hostname", &self.hostname)
            .field("system_socket", &self.system_socket)
            .field("tailscaled_path", &self.tailscaled_path)
            .field("tailscale_path", &self.tailscale_path)
            .field("state_dir", &self.state_dir)
            .field("userspace_networking", &self.userspace_networking)
            .field("startup_timeout_secs", &self.startup_timeout_secs)
            .finish()
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Database ping in the health handler.
    pub db_ping_ms: u64,

    /// Products query, including row decoding.
    pub query_ms: u64,

    /// LocalAPI calls (status, whois).
    pub network_ms: u64,

    /// Database ping performed once at startup.
    pub startup_ping_ms: u64,

    /// Upper bound for any single request.
    pub request_secs: u64,

    /// Grace period for in-flight requests on shutdown.
    pub shutdown_grace_secs: u64,
}

impl TimeoutConfig {
    pub fn db_ping(&self) -> Duration {
        Duration::from_millis(self.db_ping_ms)
    }

    pub fn query(&self) -> Duration {
        Duration::from_millis(self.query_ms)
    }

    pub fn network(&self) -> Duration {
        Duration::from_millis(self.network_ms)
    }

    pub fn startup_ping(&self) -> Duration {
        Duration::from_millis(self.startup_ping_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            db_ping_ms: 2_000,
            query_ms: 5_000,
            network_ms: 5_000,
            startup_ping_ms: 5_000,
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory holding `index.html` and the files served under `/static`.
    pub static_dir: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            static_dir: "./static".to_string(),
        }
    }
}
