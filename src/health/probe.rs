//! A single liveness probe against one backend.
//!
//! Unix socket backends are probed by connecting and hanging up; no bytes
//! are exchanged. HTTP backends get a `GET` on the health path and count as
//! up when the exchange completes with a status below 500. Either probe is
//! bounded by the backend's own request timeout.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use tokio::net::UnixStream;
use tokio::time;

use crate::load_balancer::{Backend, Transport};

/// Why a probe marked its backend down.
#[derive(Debug, thiserror::Error)]
pub enum ProbeFailure {
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    #[error("socket connect failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("unhealthy status {0}")]
    Status(StatusCode),
    #[error("invalid probe request: {0}")]
    Build(#[from] axum::http::Error),
}

/// Client used for HTTP probes.
pub type ProbeClient = Client<HttpConnector, Body>;

/// Probe `backend` once.
pub async fn probe(client: &ProbeClient, backend: &Backend, path: &str) -> Result<(), ProbeFailure> {
    let timeout = backend.timeout();
    match backend.transport() {
        Transport::UnixSocket(socket) => {
            let stream = time::timeout(timeout, UnixStream::connect(socket))
                .await
                .map_err(|_| ProbeFailure::Timeout(timeout))??;
            drop(stream);
            Ok(())
        }
        Transport::Http(base) => {
            let mut url = base.clone();
            let joined = format!("{}{}", base.path().trim_end_matches('/'), path);
            url.set_path(&joined);
            url.set_query(None);

            let request = Request::builder()
                .method(Method::GET)
                .uri(url.as_str())
                .header(header::USER_AGENT, "soulload-health-check")
                .body(Body::empty())?;

            let response = time::timeout(timeout, client.request(request))
                .await
                .map_err(|_| ProbeFailure::Timeout(timeout))??;

            let status = response.status();
            if status.is_server_error() {
                Err(ProbeFailure::Status(status))
            } else {
                Ok(())
            }
        }
    }
}
