//! LocalAPI payloads and error definitions.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Backend state reported by a node that is fully up.
pub const RUNNING: &str = "Running";

/// Node status as reported by `/localapi/v0/status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    #[serde(rename = "BackendState")]
    pub backend_state: String,

    #[serde(rename = "TailscaleIPs", default, deserialize_with = "null_as_empty")]
    pub tailscale_ips: Vec<IpAddr>,

    #[serde(rename = "Self", default)]
    pub self_node: Option<PeerStatus>,
}

impl Status {
    pub fn is_running(&self) -> bool {
        self.backend_state == RUNNING
    }

    /// First IPv4 tailnet address, if the node has one.
    pub fn ipv4(&self) -> Option<IpAddr> {
        self.tailscale_ips.iter().copied().find(IpAddr::is_ipv4)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeerStatus {
    #[serde(rename = "HostName", default)]
    pub host_name: String,

    #[serde(rename = "DNSName", default)]
    pub dns_name: String,
}

/// Identity of a remote peer, from `/localapi/v0/whois`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhoIs {
    #[serde(rename = "Node", default)]
    pub node: Option<WhoIsNode>,

    #[serde(rename = "UserProfile", default)]
    pub user_profile: Option<UserProfile>,
}

impl WhoIs {
    /// Tagged nodes are services or devices, not people.
    pub fn is_tagged(&self) -> bool {
        self.node.as_ref().is_some_and(|n| !n.tags.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhoIsNode {
    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Tags", default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "LoginName", default)]
    pub login_name: String,

    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
}

/// The daemon encodes empty lists as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Errors talking to the node's LocalAPI.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// No daemon is listening on the socket.
    #[error("tailnet client unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time.
    #[error("tailnet call timed out after {0:?}")]
    Timeout(Duration),

    /// The daemon answered with an error status.
    #[error("LocalAPI returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport or decoding failure.
    #[error("LocalAPI request failed: {0}")]
    Transport(String),
}

/// Operations the service needs from the private-network client.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn status(&self) -> Result<Status, NetworkError>;

    async fn whois(&self, remote_addr: SocketAddr) -> Result<WhoIs, NetworkError>;
}
