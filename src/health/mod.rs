//! Dependency health reporting.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → ping database (bounded)
//!     → query tailnet status (bounded)
//!     → HealthStatus (always 200)
//! ```
//!
//! # Design Decisions
//! - Both checks run concurrently and independently
//! - A failed check degrades its field; it never fails the response
//! - Check results also feed the `dependency_up` gauge

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::database::ProductStore;
use crate::observability::metrics;
use crate::tailnet::NetworkClient;

/// Reported when the tailnet status cannot be read at all.
pub const NETWORK_UNKNOWN: &str = "unknown";

/// Reported when the tailnet node is up.
pub const NETWORK_CONNECTED: &str = "connected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseState {
    Connected,
    Disconnected,
}

/// Body of `GET /health`. Computed fresh per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub database: DatabaseState,
    pub network: String,
}

/// Check both dependencies and summarize.
pub async fn check(
    store: &dyn ProductStore,
    network: &dyn NetworkClient,
    db_ping_timeout: Duration,
) -> HealthStatus {
    let (db, net) = tokio::join!(store.ping(db_ping_timeout), network.status());

    let database = match db {
        Ok(()) => DatabaseState::Connected,
        Err(e) => {
            tracing::debug!(error = %e, "Database ping failed");
            DatabaseState::Disconnected
        }
    };

    let network = match net {
        Ok(status) if status.is_running() => NETWORK_CONNECTED.to_string(),
        Ok(status) => status.backend_state,
        Err(e) => {
            tracing::debug!(error = %e, "Tailnet status unavailable");
            NETWORK_UNKNOWN.to_string()
        }
    };

    metrics::record_dependency("database", database == DatabaseState::Connected);
    metrics::record_dependency("tailnet", network == NETWORK_CONNECTED);

    HealthStatus {
        status: "ok".to_string(),
        database,
        network,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{ProductRow, StoreError};
    use crate::tailnet::{NetworkError, Status, WhoIs};
    use async_trait::async_trait;
    use std::net::SocketAddr;

    struct Store(bool);

    #[async_trait]
    impl ProductStore for Store {
        async fn ping(&self, limit: Duration) -> Result<(), StoreError> {
            if self.0 {
                Ok(())
            } else {
                Err(StoreError::Timeout(limit))
            }
        }

        async fn recent_products(&self, _limit: Duration) -> Result<Vec<ProductRow>, StoreError> {
            Ok(Vec::new())
        }
    }

    struct Net(Option<&'static str>);

    #[async_trait]
    impl NetworkClient for Net {
        async fn status(&self) -> Result<Status, NetworkError> {
            match self.0 {
                Some(state) => Ok(Status {
                    backend_state: state.to_string(),
                    ..Default::default()
                }),
                None => Err(NetworkError::Unavailable("absent".into())),
            }
        }

        async fn whois(&self, _remote_addr: SocketAddr) -> Result<WhoIs, NetworkError> {
            Err(NetworkError::Unavailable("absent".into()))
        }
    }

    async fn run(db_up: bool, net: Option<&'static str>) -> HealthStatus {
        check(&Store(db_up), &Net(net), Duration::from_secs(2)).await
    }

    #[tokio::test]
    async fn every_dependency_combination() {
        let cases = [
            (true, Some("Running"), DatabaseState::Connected, "connected"),
            (true, None, DatabaseState::Connected, "unknown"),
            (false, Some("Running"), DatabaseState::Disconnected, "connected"),
            (false, None, DatabaseState::Disconnected, "unknown"),
        ];

        for (db_up, net, database, network) in cases {
            let health = run(db_up, net).await;
            assert_eq!(health.status, "ok");
            assert_eq!(health.database, database);
            assert_eq!(health.network, network);
        }
    }

    #[tokio::test]
    async fn non_running_state_passes_through() {
        let health = run(true, Some("NeedsLogin")).await;
        assert_eq!(health.network, "NeedsLogin");
    }

    #[tokio::test]
    async fn everything_down_json() {
        let health = run(false, None).await;
        assert_eq!(
            serde_json::to_string(&health).unwrap(),
            r#"{"status":"ok","database":"disconnected","network":"unknown"}"#
        );
    }
}
