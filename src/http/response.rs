//! Response relay back to the client.
//!
//! Status, headers and body are passed through as received, minus the
//! hop-by-hop headers. The body is streamed, never buffered, and stays
//! bound by the backend's deadline.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;
use tokio::time::Instant;

use crate::http::body::DeadlineBody;
use crate::http::headers::strip_hop_by_hop;
use crate::load_balancer::Backend;

/// Turn a backend response into the client response.
///
/// A body still streaming at `deadline` is cut off and counted as a
/// failure of `backend`.
pub fn relay(response: Response<Incoming>, deadline: Instant, backend: Arc<Backend>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    let body = DeadlineBody::new(body, deadline).on_expired(move || {
        tracing::warn!(backend = %backend.id(), "Backend response body exceeded its deadline");
        backend.record_failure();
    });
    Response::from_parts(parts, Body::new(body))
}

/// 502 with a short plain-text body.
pub fn bad_gateway() -> Response<Body> {
    (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
}

/// 503 with a short plain-text body.
pub fn service_unavailable() -> Response<Body> {
    (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
}
