//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (facade counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → GET /metrics (rendered from pool state)
//!     → optional Prometheus exporter listener
//! ```

pub mod logging;
pub mod metrics;
