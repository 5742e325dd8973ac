//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, full or compact)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Connection ID flows through every session log line
//! - Request ID set and propagated on plain HTTP routes
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
