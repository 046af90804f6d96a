//! Active health checking.
//!
//! # Responsibilities
//! - Tick on a fixed interval
//! - Probe every backend concurrently on each tick
//! - Join all probes before the next tick
//! - Flip each backend's liveness flag from its probe result

use std::sync::Arc;
use std::time::Duration;

use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::LoadBalancingConfig;
use crate::health::probe::{probe, ProbeClient};
use crate::load_balancer::{Backend, BackendPool};
use crate::observability::metrics;

pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    interval: Duration,
    path: String,
    client: ProbeClient,
}

impl HealthMonitor {
    pub fn new(pool: Arc<BackendPool>, config: &LoadBalancingConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            pool,
            interval: config.effective_interval(),
            path: config.health_check_path.clone(),
            client,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until `shutdown` fires. The first round starts one interval in.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            path = %self.path,
            backends = self.pool.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once, concurrently, and wait for all of them.
    pub async fn check_all(&self) {
        let mut probes = JoinSet::new();

        for backend in self.pool.all_backends() {
            let client = self.client.clone();
            let path = self.path.clone();
            probes.spawn(async move {
                let result = probe(&client, &backend, &path).await;
                apply(&backend, result.map_err(|failure| failure.to_string()));
            });
        }

        while let Some(joined) = probes.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Health probe task failed");
            }
        }
    }
}

fn apply(backend: &Backend, result: Result<(), String>) {
    let alive = result.is_ok();
    let was_alive = backend.set_alive(alive);

    match (&result, was_alive) {
        (Ok(()), false) => {
            tracing::info!(backend = %backend.id(), address = %backend.transport(), "Backend is back up");
        }
        (Err(reason), true) => {
            tracing::warn!(
                backend = %backend.id(),
                address = %backend.transport(),
                reason = %reason,
                "Backend marked down"
            );
        }
        (Err(reason), false) => {
            tracing::debug!(backend = %backend.id(), reason = %reason, "Backend still down");
        }
        (Ok(()), true) => {}
    }

    metrics::record_backend_health(backend.id(), alive);
}
