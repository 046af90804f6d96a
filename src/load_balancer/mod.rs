//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives
//!     → pool.rs (take the pool lock for one selection round)
//!     → weighted.rs (credit alive backends, pick max, debit winner)
//!     → backend.rs (the chosen target and its client)
//!     → None when nothing is alive (caller answers 503)
//! ```
//!
//! # Design Decisions
//! - Pool membership is fixed at startup
//! - Scheduling state lives in each backend, under the backend's own lock
//! - Dead backends are excluded from selection but keep their credit

pub mod backend;
pub mod pool;
pub mod weighted;

use std::fmt::Debug;
use std::sync::Arc;

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Choose one backend among `backends`, or `None` if none is eligible.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}

pub use backend::{Backend, Transport};
pub use pool::BackendPool;
