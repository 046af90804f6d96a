//! Backend pool management.
//!
//! # Responsibilities
//! - Own the ordered, fixed list of backends
//! - Serialize selections so each weighted round is applied atomically
//! - Hand out the backend list to the health monitor and metrics reader

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::BackendConfig;
use crate::load_balancer::{backend::Backend, weighted::WeightedRoundRobin, LoadBalancer};

/// The set of backends behind the listener.
#[derive(Debug)]
pub struct BackendPool {
    /// Taken exclusively for a selection round, shared for reads.
    backends: RwLock<Vec<Arc<Backend>>>,
    balancer: Box<dyn LoadBalancer>,
}

impl BackendPool {
    /// Create a pool scheduled by weighted round robin.
    pub fn new(backends: Vec<Backend>) -> Self {
        Self::with_balancer(backends, Box::new(WeightedRoundRobin::new()))
    }

    pub fn with_balancer(backends: Vec<Backend>, balancer: Box<dyn LoadBalancer>) -> Self {
        Self {
            backends: RwLock::new(backends.into_iter().map(Arc::new).collect()),
            balancer,
        }
    }

    /// Build a pool from configuration; backend `i` gets id `backend-i`.
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self, url::ParseError> {
        let backends = configs
            .iter()
            .enumerate()
            .map(|(index, config)| Backend::from_config(index, config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(backends))
    }

    /// Pick the backend for the next request, or `None` if none is alive.
    pub fn next_backend(&self) -> Option<Arc<Backend>> {
        let backends = self.backends.write();
        let selected = self.balancer.next_server(&backends);
        if selected.is_none() {
            tracing::debug!(backend_count = backends.len(), "No alive backends in pool");
        }
        selected
    }

    /// A copy of the backend list (for health checking).
    pub fn all_backends(&self) -> Vec<Arc<Backend>> {
        self.backends.read().clone()
    }

    /// Run `f` over the backends while holding the pool lock shared.
    pub fn with_backends<R>(&self, f: impl FnOnce(&[Arc<Backend>]) -> R) -> R {
        let backends = self.backends.read();
        f(&backends)
    }

    pub(crate) fn len(&self) -> usize {
        self.backends.read().len()
    }
}
