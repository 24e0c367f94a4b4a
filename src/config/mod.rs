//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → loader.rs (optional TOML file)
//!     → cli.rs (flags / environment variables)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable for the process lifetime)
//! ```
//!
//! # Design Decisions
//! - Config is resolved once at startup; there is no reload
//! - All fields have defaults to allow running with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::ConfigError;
pub use schema::{
    AppConfig, AssetsConfig, DatabaseConfig, ListenerConfig, ObservabilityConfig, TailnetConfig,
    TimeoutConfig,
};
