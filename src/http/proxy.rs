//! The reverse proxy handler.
//!
//! Picks a backend, rewrites the request, forwards it under the backend's
//! deadline and relays the answer. Nothing on this path retries or
//! re-selects: no alive backend is a 503, any transport failure is a 502.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::Response;
use hyper::body::Incoming;
use tokio::time::{self, Instant};

use crate::http::request::direct;
use crate::http::response::{bad_gateway, relay, service_unavailable};
use crate::http::server::AppState;
use crate::load_balancer::Backend;
use crate::observability::metrics;

/// Why a request could not be relayed.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid outbound request: {0}")]
    Build(#[from] axum::http::Error),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

/// Fallback handler for every path not served locally.
pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response<Body> {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(backend) = state.pool.next_backend() else {
        tracing::warn!(method = %method, path = %path, "No alive backend, rejecting request");
        metrics::record_request(503, "none", started);
        return service_unavailable();
    };

    tracing::debug!(backend = %backend.id(), method = %method, path = %path, "Proxying request");

    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let deadline = started + backend.timeout();
    let headers_by = head_deadline(started, deadline, state.write_timeout);
    match dispatch(&backend, request, client_addr, headers_by).await {
        Ok(response) => {
            backend.record_success(started.elapsed());
            metrics::record_request(response.status().as_u16(), backend.id(), started);
            relay(response, deadline, backend)
        }
        Err(e) => {
            backend.record_failure();
            tracing::error!(backend = %backend.id(), method = %method, path = %path, error = %e, "Backend error");
            metrics::record_request(502, backend.id(), started);
            bad_gateway()
        }
    }
}

/// The backend deadline, tightened by the server's write timeout when set.
///
/// The write timeout only bounds the wait for response headers.
fn head_deadline(started: Instant, deadline: Instant, write_timeout: Duration) -> Instant {
    if write_timeout.is_zero() {
        deadline
    } else {
        deadline.min(started + write_timeout)
    }
}

/// Send `request` to `backend`, bounded by `deadline`.
pub async fn dispatch(
    backend: &Backend,
    request: Request,
    client_addr: Option<SocketAddr>,
    deadline: Instant,
) -> Result<Response<Incoming>, ProxyError> {
    backend.record_dispatch();
    let outbound = direct(backend, request, client_addr)?;
    let bound = deadline.saturating_duration_since(Instant::now());

    match time::timeout_at(deadline, backend.client().request(outbound)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ProxyError::Timeout(bound)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_timeout_tightens_only_when_shorter() {
        let started = Instant::now();
        let deadline = started + Duration::from_secs(5);

        assert_eq!(head_deadline(started, deadline, Duration::ZERO), deadline);
        assert_eq!(
            head_deadline(started, deadline, Duration::from_millis(200)),
            started + Duration::from_millis(200)
        );
        assert_eq!(head_deadline(started, deadline, Duration::from_secs(30)), deadline);
    }
}
