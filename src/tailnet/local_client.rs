//! LocalAPI client over the daemon's unix socket.
//!
//! # Responsibilities
//! - One HTTP/1.1 exchange per call on a fresh socket connection
//! - Bound every call with the configured network timeout
//! - Map a missing socket to `Unavailable` so callers can degrade

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, Request};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tokio::time::timeout;

use crate::tailnet::types::{NetworkClient, NetworkError, Status, WhoIs};

/// Host header the daemon expects on LocalAPI requests.
const LOCALAPI_HOST: &str = "local-tailscaled.sock";

/// Client for a tailscaled LocalAPI socket.
#[derive(Debug, Clone)]
pub struct LocalClient {
    socket_path: PathBuf,
    timeout_duration: Duration,
}

impl LocalClient {
    pub fn new(socket_path: impl Into<PathBuf>, timeout_duration: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout_duration,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, NetworkError> {
        match timeout(self.timeout_duration, self.exchange(path_and_query)).await {
            Ok(result) => {
                let body = result?;
                serde_json::from_slice(&body)
                    .map_err(|e| NetworkError::Transport(format!("invalid LocalAPI payload: {}", e)))
            }
            Err(_) => Err(NetworkError::Timeout(self.timeout_duration)),
        }
    }

    #[cfg(unix)]
    async fn exchange(&self, path_and_query: &str) -> Result<Bytes, NetworkError> {
        let stream = tokio::net::UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| {
                NetworkError::Unavailable(format!("{}: {}", self.socket_path.display(), e))
            })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "LocalAPI connection closed with error");
            }
        });

        let request = Request::get(path_and_query)
            .header(header::HOST, LOCALAPI_HOST)
            .body(Empty::<Bytes>::new())
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?
            .to_bytes();

        if !status.is_success() {
            return Err(NetworkError::Api {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }
        Ok(body)
    }

    #[cfg(not(unix))]
    async fn exchange(&self, _path_and_query: &str) -> Result<Bytes, NetworkError> {
        Err(NetworkError::Unavailable(
            "LocalAPI sockets are only supported on unix".to_string(),
        ))
    }
}

/// Path and query for a whois lookup of `addr`.
pub fn whois_path(addr: SocketAddr) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(addr.to_string().as_bytes()).collect();
    format!("/localapi/v0/whois?addr={}", encoded)
}

#[async_trait]
impl NetworkClient for LocalClient {
    async fn status(&self) -> Result<Status, NetworkError> {
        self.get_json("/localapi/v0/status").await
    }

    async fn whois(&self, remote_addr: SocketAddr) -> Result<WhoIs, NetworkError> {
        self.get_json(&whois_path(remote_addr)).await
    }
}
