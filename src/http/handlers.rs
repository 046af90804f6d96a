//! Locally served endpoints: liveness and metrics.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::metrics;

pub const SERVICE_NAME: &str = "SoulLoad";

/// Prometheus text exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
}

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}

/// `GET /healthz`
pub async fn liveness() -> Json<Liveness> {
    Json(Liveness {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        service: SERVICE_NAME,
    })
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, METRICS_CONTENT_TYPE)], metrics::render(&state.pool))
}
