//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. All failures are collected
//! so a broken config reports every problem at once.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use sqlx::postgres::PgSslMode;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be non-zero"));
    }

    let db = &config.database;
    if db.host.trim().is_empty() {
        errors.push(ValidationError::new("database.host", "must not be empty"));
    }
    if db.port == 0 {
        errors.push(ValidationError::new("database.port", "must be non-zero"));
    }
    if db.user.trim().is_empty() {
        errors.push(ValidationError::new("database.user", "must not be empty"));
    }
    if db.name.trim().is_empty() {
        errors.push(ValidationError::new("database.name", "must not be empty"));
    }
    if PgSslMode::from_str(&db.ssl_mode).is_err() {
        errors.push(ValidationError::new(
            "database.ssl_mode",
            format!("unknown ssl mode '{}'", db.ssl_mode),
        ));
    }
    if db.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be >= 1"));
    }

    let tailnet = &config.tailnet;
    if tailnet.embedded() {
        if tailnet.hostname.trim().is_empty() {
            errors.push(ValidationError::new(
                "tailnet.hostname",
                "must not be empty when an auth key is set",
            ));
        }
        if tailnet.state_dir.trim().is_empty() {
            errors.push(ValidationError::new("tailnet.state_dir", "must not be empty"));
        }
        if tailnet.startup_timeout_secs == 0 {
            errors.push(ValidationError::new("tailnet.startup_timeout_secs", "must be > 0"));
        }
    }

    let t = &config.timeouts;
    for (field, value) in [
        ("timeouts.db_ping_ms", t.db_ping_ms),
        ("timeouts.query_ms", t.query_ms),
        ("timeouts.network_ms", t.network_ms),
        ("timeouts.startup_ping_ms", t.startup_ping_ms),
        ("timeouts.request_secs", t.request_secs),
        ("timeouts.shutdown_grace_secs", t.shutdown_grace_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
