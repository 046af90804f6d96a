//! Metrics collection and exposition.
//!
//! # Metrics
//! Rendered from pool state on every `GET /metrics`:
//! - `backend_requests_total` (counter): requests dispatched to the backend
//! - `backend_failures_total` (counter): transport failures and timeouts
//! - `backend_response_time_ms` (gauge): time to headers of the last success
//! - `backend_alive` (gauge): 1=alive, 0=dead
//!
//! Recorded through the `metrics` facade, exported only when an exporter
//! is installed:
//! - `soulload_requests_total` (counter): requests by status and backend
//! - `soulload_request_duration_seconds` (histogram): time to headers
//! - `soulload_backend_alive` (gauge): liveness as seen by the health monitor

use std::fmt::Write;
use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tokio::time::Instant;

use crate::load_balancer::backend::BackendSnapshot;
use crate::load_balancer::BackendPool;

struct Family {
    name: &'static str,
    kind: &'static str,
    help: &'static str,
    value: fn(&BackendSnapshot) -> String,
}

const REQUESTS: Family = Family {
    name: "backend_requests_total",
    kind: "counter",
    help: "Total number of requests dispatched to the backend",
    value: |s| s.requests_total.to_string(),
};
const FAILURES: Family = Family {
    name: "backend_failures_total",
    kind: "counter",
    help: "Total number of failed requests to the backend",
    value: |s| s.failures_total.to_string(),
};
const RESPONSE_TIME: Family = Family {
    name: "backend_response_time_ms",
    kind: "gauge",
    help: "Response time of the last successful request in milliseconds",
    value: |s| format!("{:.3}", s.response_time.as_secs_f64() * 1000.0),
};
const ALIVE: Family = Family {
    name: "backend_alive",
    kind: "gauge",
    help: "Whether the backend is alive (1) or dead (0)",
    value: |s| u8::from(s.alive).to_string(),
};

/// Render the pool as Prometheus text.
///
/// Only reads backend state; the pool lock is shared.
pub fn render(pool: &BackendPool) -> String {
    let snapshots: Vec<(String, BackendSnapshot)> = pool.with_backends(|backends| {
        backends
            .iter()
            .map(|backend| (backend.id().to_string(), backend.snapshot()))
            .collect()
    });

    let mut out = String::new();
    for family in [REQUESTS, FAILURES, RESPONSE_TIME, ALIVE] {
        let _ = writeln!(out, "# HELP {} {}", family.name, family.help);
        let _ = writeln!(out, "# TYPE {} {}", family.name, family.kind);
        for (id, snapshot) in &snapshots {
            let _ = writeln!(out, "{}{{backend=\"{}\"}} {}", family.name, id, (family.value)(snapshot));
        }
    }
    out
}

/// Record a finished proxy request.
pub fn record_request(status: u16, backend: &str, start: Instant) {
    let status = status.to_string();
    counter!(
        "soulload_requests_total",
        "status" => status.clone(),
        "backend" => backend.to_string()
    )
    .increment(1);
    histogram!(
        "soulload_request_duration_seconds",
        "status" => status,
        "backend" => backend.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a backend's liveness after a health check.
pub fn record_backend_health(backend: &str, alive: bool) {
    gauge!("soulload_backend_alive", "backend" => backend.to_string()).set(if alive { 1.0 } else { 0.0 });
}

/// Install the process-wide Prometheus exporter listening on `addr`.
pub fn init_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}
