//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! handlers, health checks, lifecycle
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
