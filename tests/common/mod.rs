//! Shared fakes and server harness for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tailnet_demo::config::AppConfig;
use tailnet_demo::database::{MarshalError, ProductRow, ProductStore, StoreError, Value};
use tailnet_demo::http::{AppState, HttpServer};
use tailnet_demo::lifecycle::Shutdown;
use tailnet_demo::net::ServeMode;
use tailnet_demo::tailnet::{NetworkClient, NetworkError, Status, UserProfile, WhoIs, WhoIsNode};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the fake store answers to a products query.
#[derive(Clone)]
pub enum Products {
    Rows(Vec<ProductRow>),
    QueryError(&'static str),
    Slow(Duration),
}

pub struct FakeStore {
    pub reachable: bool,
    pub products: Products,
    pub queries: AtomicUsize,
}

impl FakeStore {
    pub fn new(reachable: bool, products: Products) -> Arc<Self> {
        Arc::new(Self {
            reachable,
            products,
            queries: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ProductStore for FakeStore {
    async fn ping(&self, limit: Duration) -> Result<(), StoreError> {
        if self.reachable {
            Ok(())
        } else {
            Err(StoreError::Timeout(limit))
        }
    }

    async fn recent_products(&self, _limit: Duration) -> Result<Vec<ProductRow>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match &self.products {
            Products::Rows(rows) => Ok(rows.clone()),
            Products::QueryError(message) => Err(MarshalError::Query(message.to_string()).into()),
            Products::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Vec::new())
            }
        }
    }
}

/// What the fake tailnet client reports about the node and its peers.
#[derive(Clone)]
pub enum Peer {
    Person { login: &'static str, display: &'static str },
    Tagged,
    Absent,
}

pub struct FakeNetwork {
    pub backend_state: Option<&'static str>,
    pub peer: Peer,
    pub lookups: AtomicUsize,
}

impl FakeNetwork {
    pub fn new(backend_state: Option<&'static str>, peer: Peer) -> Arc<Self> {
        Arc::new(Self {
            backend_state,
            peer,
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn absent() -> Arc<Self> {
        Self::new(None, Peer::Absent)
    }
}

#[async_trait]
impl NetworkClient for FakeNetwork {
    async fn status(&self) -> Result<Status, NetworkError> {
        match self.backend_state {
            Some(state) => Ok(Status {
                backend_state: state.to_string(),
                ..Default::default()
            }),
            None => Err(NetworkError::Unavailable("no tailscaled socket".into())),
        }
    }

    async fn whois(&self, _remote_addr: SocketAddr) -> Result<WhoIs, NetworkError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match &self.peer {
            Peer::Person { login, display } => Ok(WhoIs {
                node: Some(WhoIsNode::default()),
                user_profile: Some(UserProfile {
                    login_name: login.to_string(),
                    display_name: display.to_string(),
                }),
            }),
            Peer::Tagged => Ok(WhoIs {
                node: Some(WhoIsNode {
                    name: "build-agent".into(),
                    tags: vec!["tag:ci".into()],
                }),
                user_profile: None,
            }),
            Peer::Absent => Err(NetworkError::Unavailable("no tailscaled socket".into())),
        }
    }
}

/// A product row shaped like the demo table.
pub fn product(id: i64, name: &str, price: &str, day: u32) -> ProductRow {
    ProductRow::new(vec![
        ("id".into(), Value::Integer(id)),
        ("name".into(), Value::Text(name.into())),
        ("price".into(), Value::Text(price.into())),
        (
            "created_at".into(),
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()),
        ),
    ])
}

/// A running server under test.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config pointing at `static_dir`, with short timeouts.
pub fn test_config(static_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.assets.static_dir = static_dir.to_string_lossy().into_owned();
    config.timeouts.request_secs = 2;
    config.timeouts.shutdown_grace_secs = 1;
    config
}

/// Start the real router on an ephemeral loopback port.
pub async fn spawn_server(
    config: AppConfig,
    store: Arc<dyn ProductStore>,
    network: Arc<dyn NetworkClient>,
    mode: ServeMode,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let state = AppState::new(store, network, mode, config.timeouts);
    let server = HttpServer::new(&config, state);
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();

    let handle = tokio::spawn(async move { server.run(listener, receiver).await });

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
