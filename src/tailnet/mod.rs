//! Private-network (tailnet) integration subsystem.
//!
//! # Data Flow
//! ```text
//! standard mode:  system tailscaled socket ─┐
//!                                           ├→ local_client.rs (LocalAPI over unix socket)
//! embedded mode:  embedded.rs (own daemon) ─┘      → status / whois
//! ```
//!
//! # Security Constraints
//! - The auth key is never logged and never passed on a command line
//! - Every LocalAPI call has a deadline
//! - A missing daemon degrades health and identity, it never fails a request

pub mod embedded;
pub mod local_client;
pub mod types;

pub use embedded::{EmbeddedTailnet, TailnetError};
pub use local_client::LocalClient;
pub use types::{NetworkClient, NetworkError, Status, UserProfile, WhoIs, WhoIsNode};
