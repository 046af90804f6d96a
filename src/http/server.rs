//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Create the Axum router with local endpoints and the proxy fallback
//! - Wire up middleware (tracing, request ID, local response timeout)
//! - Serve accepted connections with HTTP/1.1 and HTTP/2
//! - Enforce header-read and idle timeouts per connection
//! - Drain connections on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ProxyConfig, ServerConfig};
use crate::http::handlers;
use crate::http::proxy::proxy_handler;
use crate::load_balancer::BackendPool;
use crate::net::connection::{idle_watchdog, ActivityClock, ActivityStream, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};

/// How long in-flight connections get to finish after shutdown begins.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Back-off after a failed accept, so fd exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<BackendPool>,
    /// Bound on producing response headers. Zero is unbounded.
    pub write_timeout: Duration,
}

/// Per-connection timeouts; zero disables each.
#[derive(Debug, Clone, Copy, Default)]
struct ConnectionSettings {
    read_timeout: Duration,
    idle_timeout: Duration,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    settings: ConnectionSettings,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(config: &ProxyConfig, pool: Arc<BackendPool>) -> Self {
        let state = AppState {
            pool,
            write_timeout: config.server.write_timeout,
        };
        let router = Self::build_router(&config.server, state);
        Self {
            router,
            settings: ConnectionSettings {
                read_timeout: config.server.read_timeout,
                idle_timeout: config.server.idle_timeout,
            },
            tracker: ConnectionTracker::new(),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The write timeout layer covers the local routes only. The proxy
    /// fallback applies it to its own deadline so a timed out backend is
    /// still recorded as a failure.
    fn build_router(server: &ServerConfig, state: AppState) -> Router {
        let mut router: Router<AppState> = Router::new()
            .route("/health", get(handlers::health))
            .route("/healthz", get(handlers::liveness))
            .route("/metrics", get(handlers::metrics));

        if !server.write_timeout.is_zero() {
            router = router.route_layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                server.write_timeout,
            ));
        }

        router
            .fallback(proxy_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving it without the connection machinery.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(address = %addr, "HTTP server starting");

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit),
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                    Err(e) => return Err(e),
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        self.tracker.begin_shutdown();
        if !self.tracker.wait_for_drain(DRAIN_TIMEOUT).await {
            tracing::warn!(
                open_connections = self.tracker.active_count(),
                "Connections still open after drain timeout"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let router = self.router.clone();
        let settings = self.settings;
        let guard = self.tracker.track();
        let shutdown = self.tracker.shutdown_receiver();

        tokio::spawn(async move {
            let connection_id = guard.id();
            serve_connection(stream, peer, router, settings, shutdown).await;
            tracing::trace!(connection_id = %connection_id, peer_addr = %peer, "Connection finished");
            drop(permit);
            drop(guard);
        });
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    settings: ConnectionSettings,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let clock = Arc::new(ActivityClock::new());
    let io = TokioIo::new(ActivityStream::new(stream, clock.clone()));

    let service = service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().oneshot(request)
    });

    let mut builder = auto::Builder::new(TokioExecutor::new());
    if !settings.read_timeout.is_zero() {
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(settings.read_timeout);
    }

    let connection = builder.serve_connection(io, service);
    tokio::pin!(connection);

    let watchdog = idle_watchdog(clock, settings.idle_timeout);
    tokio::pin!(watchdog);

    let mut draining = *shutdown.borrow();
    if draining {
        connection.as_mut().graceful_shutdown();
    }

    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(peer_addr = %peer, error = %e, "Connection error");
                }
                break;
            }
            _ = &mut watchdog, if !draining => {
                tracing::debug!(peer_addr = %peer, "Closing idle connection");
                draining = true;
                connection.as_mut().graceful_shutdown();
            }
            _ = shutdown.changed(), if !draining => {
                draining = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    fn server_with(backends: Vec<BackendConfig>) -> HttpServer {
        let mut config = ProxyConfig::default();
        config.backends = backends;
        let pool = Arc::new(BackendPool::from_config(&config.backends).unwrap());
        HttpServer::new(&config, pool)
    }

    #[tokio::test]
    async fn local_endpoints_are_routed() {
        let server = server_with(vec![BackendConfig::new("http://127.0.0.1:9", 1, Duration::ZERO)]);

        let response = server
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let response = server
            .router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn no_alive_backend_is_503() {
        let config = ProxyConfig::default();
        let pool = Arc::new(
            BackendPool::from_config(&[BackendConfig::new("http://127.0.0.1:9", 1, Duration::ZERO)])
                .unwrap(),
        );
        for backend in pool.all_backends() {
            backend.set_alive(false);
        }
        let server = HttpServer::new(&config, pool.clone());

        let response = server
            .router()
            .oneshot(Request::get("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(pool.all_backends()[0].snapshot().requests_total, 0);
    }
}
