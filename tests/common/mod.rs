//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::mpsc;

use soulload::config::{BackendConfig, ProxyConfig};
use soulload::health::HealthMonitor;
use soulload::load_balancer::BackendPool;
use soulload::net::Listener;
use soulload::{HttpServer, Shutdown};

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Start a mock backend that answers every request with `response`.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    serve(Router::new().fallback(move || async move { response })).await
}

/// Start a programmable mock backend; `f` decides status and body per request.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let f = Arc::new(f);
    let handler = move || {
        let f = f.clone();
        async move {
            let (status, body) = f().await;
            (StatusCode::from_u16(status).unwrap_or(StatusCode::OK), body)
        }
    };
    serve(Router::new().fallback(handler)).await
}

/// Start a backend that echoes the path and headers it received as JSON.
pub async fn start_echo_backend() -> SocketAddr {
    serve(Router::new().fallback(echo)).await
}

async fn echo(uri: Uri, headers: HeaderMap) -> Json<Value> {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
        .collect();
    Json(json!({ "uri": uri.to_string(), "headers": headers }))
}

/// Start a backend that accepts connections and never answers.
pub async fn start_hanging_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Start a backend that never answers and reports each connection the
/// proxy closes on the returned channel.
pub async fn start_observed_hanging_backend() -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
                let _ = closed_tx.send(());
            });
        }
    });
    (addr, closed_rx)
}

/// Start a backend that sends its response head and part of the body,
/// then stalls without closing the connection.
pub async fn start_stalling_body_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
                .await;
            held.push(socket);
        }
    });
    addr
}

/// Start a backend that answers every request with `response` after `delay`.
pub async fn start_slow_backend(delay: Duration, response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move {
        tokio::time::sleep(delay).await;
        (200, response.to_string())
    })
    .await
}

/// Start a mock backend on a Unix socket at `path`.
pub async fn start_unix_backend(path: &Path, response: &'static str) {
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path).unwrap();
    let router = Router::new().fallback(move || async move { response });
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
}

/// An address nothing listens on.
pub async fn refused_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn backend(address: impl Into<String>, weight: u32, timeout: Duration) -> BackendConfig {
    BackendConfig::new(address, weight, timeout)
}

/// A running load balancer.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub pool: Arc<BackendPool>,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the load balancer on an ephemeral port.
///
/// The health monitor only runs when `with_health` is set.
pub async fn start_proxy(config: ProxyConfig, with_health: bool) -> TestProxy {
    let pool = Arc::new(BackendPool::from_config(&config.backends).unwrap());
    let shutdown = Shutdown::new();

    if with_health {
        let monitor = HealthMonitor::new(pool.clone(), &config.load_balancing);
        tokio::spawn(monitor.run(shutdown.subscribe()));
    }

    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::new(tcp, config.server.max_connections);
    let server = HttpServer::new(&config, pool.clone());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy { addr, pool, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
