//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the backend pool from validated configuration
//! - Start the optional metrics exporter
//! - Bind the listener, start the health monitor, then serve
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds before the health monitor starts, so a bind
//!   failure leaves nothing running

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{ConfigError, ProxyConfig};
use crate::health::HealthMonitor;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::load_balancer::BackendPool;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Errors that stop the process before or while serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid backend address: {0}")]
    Backend(#[from] url::ParseError),
    #[error("invalid exporter address {address:?}: {reason}")]
    ExporterAddress { address: String, reason: String },
    #[error("metrics exporter failed: {0}")]
    Exporter(#[from] metrics_exporter_prometheus::BuildError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Start every subsystem and serve until `shutdown` fires.
pub async fn run(config: ProxyConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    let bind_address = config.server.bind_address();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %bind_address,
        strategy = %config.load_balancing.strategy,
        "SoulLoad starting"
    );
    for (index, backend) in config.backends.iter().enumerate() {
        tracing::info!(
            backend = %format!("backend-{}", index),
            address = %backend.address,
            weight = backend.weight,
            timeout = ?backend.effective_timeout(),
            "Backend configured"
        );
    }
    if !config.load_balancing.is_known_strategy() {
        tracing::warn!(
            strategy = %config.load_balancing.strategy,
            "Unknown load balancing strategy, using weighted round robin"
        );
    }

    let pool = Arc::new(BackendPool::from_config(&config.backends)?);

    if let Some(address) = &config.observability.exporter_address {
        let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| {
            StartupError::ExporterAddress {
                address: address.clone(),
                reason: e.to_string(),
            }
        })?;
        metrics::init_exporter(addr)?;
    }

    let listener = Listener::bind(&bind_address, config.server.max_connections).await?;

    let monitor = HealthMonitor::new(pool.clone(), &config.load_balancing);
    let monitor_shutdown = shutdown.subscribe();
    let monitor_task = tokio::spawn(monitor.run(monitor_shutdown));

    let server = HttpServer::new(&config, pool);
    let served = server.run(listener, shutdown.subscribe()).await;

    shutdown.trigger();
    if let Err(e) = monitor_task.await {
        tracing::error!(error = %e, "Health monitor task failed");
    }

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
