//! Outbound request rewriting (the director).
//!
//! # Responsibilities
//! - Point the request URI at the selected backend
//! - Strip hop-by-hop headers
//! - Add forwarding headers (`X-Forwarded-Host`, `X-Origin-Host`, `X-Forwarded-For`)
//!
//! # Design Decisions
//! - The inbound `Host` header is kept, so the backend sees the public host
//! - Unix socket requests are addressed to `http://localhost`; the
//!   connector dials the socket regardless of the URI
//! - Outbound requests are always HTTP/1.1

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, HOST};
use axum::http::{Request, Uri, Version};

use crate::http::headers::strip_hop_by_hop;
use crate::load_balancer::{Backend, Transport};

pub static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub static X_ORIGIN_HOST: HeaderName = HeaderName::from_static("x-origin-host");
pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Base URI used for Unix socket backends.
const UNIX_PLACEHOLDER: &str = "http://localhost";

/// Rewrite an inbound request so it can be sent to `backend`.
pub fn direct(
    backend: &Backend,
    request: Request<Body>,
    client_addr: Option<SocketAddr>,
) -> Result<Request<Body>, axum::http::Error> {
    let (mut parts, body) = request.into_parts();

    let public_host = parts.headers.get(HOST).cloned().or_else(|| {
        parts
            .uri
            .authority()
            .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
    });

    parts.uri = outbound_uri(backend.transport(), &parts.uri)?;
    parts.version = Version::HTTP_11;

    strip_hop_by_hop(&mut parts.headers);

    if let Some(host) = public_host {
        parts.headers.insert(X_FORWARDED_HOST.clone(), host);
    }
    parts
        .headers
        .insert(X_ORIGIN_HOST.clone(), HeaderValue::from_str(&backend.origin_host())?);

    if let Some(addr) = client_addr {
        let mut forwarded: Vec<String> = parts
            .headers
            .get_all(&X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        forwarded.push(addr.ip().to_string());
        parts
            .headers
            .insert(X_FORWARDED_FOR.clone(), HeaderValue::from_str(&forwarded.join(", "))?);
    }

    Ok(Request::from_parts(parts, body))
}

/// Compute the backend-facing URI for an inbound request URI.
pub fn outbound_uri(transport: &Transport, inbound: &Uri) -> Result<Uri, axum::http::Error> {
    let path_and_query = inbound.path_and_query().map_or("/", |pq| pq.as_str());

    match transport {
        Transport::UnixSocket(_) => Ok(format!("{}{}", UNIX_PLACEHOLDER, path_and_query).parse::<Uri>()?),
        Transport::Http(base) => {
            let path = single_joining_slash(base.path(), inbound.path());
            let query = match (base.query().filter(|q| !q.is_empty()), inbound.query()) {
                (Some(b), Some(r)) if !r.is_empty() => Some(format!("{}&{}", b, r)),
                (Some(b), _) => Some(b.to_string()),
                (None, r) => r.map(str::to_string),
            };
            let path_and_query = match query {
                Some(q) => format!("{}?{}", path, q),
                None => path,
            };

            let authority = match base.port() {
                Some(port) => format!("{}:{}", base.host_str().unwrap_or_default(), port),
                None => base.host_str().unwrap_or_default().to_string(),
            };

            Uri::builder()
                .scheme(base.scheme())
                .authority(authority)
                .path_and_query(path_and_query)
                .build()
        }
    }
}

fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) => format!("{}/{}", a, b),
        _ => format!("{}{}", a, b),
    }
}
