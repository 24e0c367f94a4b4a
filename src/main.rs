//! Tailnet demo web service.
//!
//! A small web application that lists products from Postgres and tells the
//! caller who they are on the tailnet.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client request
//!        │
//!        ▼
//!   ┌──────────┐    ┌──────────┐    ┌──────────────────────────────┐
//!   │   net    │───▶│   http   │───▶│ handlers                     │
//!   │ provider │    │  server  │    │  /health  /api/user  /api/.. │
//!   └────┬─────┘    └──────────┘    └───┬──────────┬───────────┬───┘
//!        │                              │          │           │
//!        ▼                              ▼          ▼           ▼
//!   ┌──────────┐                  ┌──────────┐ ┌────────┐ ┌──────────┐
//!   │ tailnet  │◀─────────────────│ identity │ │ health │ │ database │──▶ Postgres
//!   │  daemon  │                  └──────────┘ └────────┘ └──────────┘
//!   └──────────┘
//! ```
//!
//! Exit status: 0 after a clean shutdown, 1 on startup failure, 2 on
//! invalid configuration.

use std::process::ExitCode;

use clap::Parser;

use tailnet_demo::config::Cli;
use tailnet_demo::lifecycle;
use tailnet_demo::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Cli::parse().resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    logging::init(&config.observability.log_level);

    tracing::debug!(config = ?config, "Configuration loaded");

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
