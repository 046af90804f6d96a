//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (active.rs)
//!     → one task per backend (probe.rs)
//!     → join all probes
//!     → Backend::set_alive under the backend lock
//! ```
//!
//! # Design Decisions
//! - Probes run concurrently so a hanging backend cannot delay the others
//! - Each probe is bounded by its backend's request timeout
//! - A single probe result decides liveness; there is no hysteresis
//! - Request failures never flip liveness; only probes do

pub mod active;
pub mod probe;

pub use active::HealthMonitor;
