//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! startup
//!     → picks one ListenerProvider from config (standard or embedded)
//!     → listener.rs (bind TCP, expose network client)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Start mode is decided once; nothing downstream branches on it except
//!   identity error reporting
//! - Both modes hand the server a plain `TcpListener`

pub mod listener;

pub use listener::{bind_tcp, ListenerError, ListenerProvider, ServeMode, StandardListener};
