//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream target (HTTP base URL or Unix socket)
//! - Hold the static weight and the mutable scheduling weight
//! - Track liveness as reported by the health monitor
//! - Keep per-backend request bookkeeping for `/metrics`
//!
//! All mutable state sits behind one read/write lock per backend.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use parking_lot::RwLock;
use url::Url;

use crate::config::schema::BackendConfig;
use crate::config::validation::UNIX_PREFIX;
use crate::http::client::UpstreamClient;

/// `X-Origin-Host` value reported for Unix socket backends.
pub const UNIX_ORIGIN_HOST: &str = "unix-socket";

/// How a backend is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// TCP, addressed by a base URL.
    Http(Url),
    /// Unix domain socket at a filesystem path.
    UnixSocket(PathBuf),
}

impl Transport {
    /// Parse a configured address. `unix://` selects the socket transport.
    pub fn parse(address: &str) -> Result<Self, url::ParseError> {
        match address.strip_prefix(UNIX_PREFIX) {
            Some(path) => Ok(Transport::UnixSocket(PathBuf::from(path))),
            None => Url::parse(address).map(Transport::Http),
        }
    }

    pub fn is_unix_socket(&self) -> bool {
        matches!(self, Transport::UnixSocket(_))
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Http(url) => write!(f, "{}", url),
            Transport::UnixSocket(path) => write!(f, "{}{}", UNIX_PREFIX, path.display()),
        }
    }
}

/// Mutable per-backend state, guarded by the backend's lock.
#[derive(Debug, Clone)]
struct BackendState {
    alive: bool,
    current_weight: i64,
    requests_total: u64,
    failures_total: u64,
    response_time: Duration,
}

/// Point-in-time copy of a backend's bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSnapshot {
    pub alive: bool,
    pub current_weight: i64,
    pub requests_total: u64,
    pub failures_total: u64,
    pub response_time: Duration,
}

/// A single backend server.
pub struct Backend {
    id: String,
    transport: Transport,
    weight: i64,
    timeout: Duration,
    state: RwLock<BackendState>,
    client: UpstreamClient,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("id", &self.id)
            .field("transport", &self.transport)
            .field("weight", &self.weight)
            .field("timeout", &self.timeout)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl Backend {
    /// Create a new backend. It starts alive with `current_weight == weight`.
    pub fn new(id: impl Into<String>, transport: Transport, weight: u32, timeout: Duration) -> Self {
        let weight = i64::from(weight.max(1));
        let client = UpstreamClient::for_transport(&transport);
        Self {
            id: id.into(),
            transport,
            weight,
            timeout,
            state: RwLock::new(BackendState {
                alive: true,
                current_weight: weight,
                requests_total: 0,
                failures_total: 0,
                response_time: Duration::ZERO,
            }),
            client,
        }
    }

    /// Build the backend at position `index` of the configured list.
    pub fn from_config(index: usize, config: &BackendConfig) -> Result<Self, url::ParseError> {
        let transport = Transport::parse(&config.address)?;
        Ok(Self::new(
            format!("backend-{}", index),
            transport,
            config.weight,
            config.effective_timeout(),
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }

    /// Bound applied to proxied requests and health probes.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    /// `host[:port]` of the base URL, or [`UNIX_ORIGIN_HOST`].
    pub fn origin_host(&self) -> String {
        match &self.transport {
            Transport::UnixSocket(_) => UNIX_ORIGIN_HOST.to_string(),
            Transport::Http(url) => {
                let host = url.host_str().unwrap_or_default();
                match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                }
            }
        }
    }

    // --- Liveness ---

    pub fn is_alive(&self) -> bool {
        self.state.read().alive
    }

    /// Set liveness, returning the previous value.
    pub fn set_alive(&self, alive: bool) -> bool {
        let mut state = self.state.write();
        std::mem::replace(&mut state.alive, alive)
    }

    // --- Scheduling ---

    pub fn current_weight(&self) -> i64 {
        self.state.read().current_weight
    }

    /// Add the static weight to the scheduling weight and return the result.
    pub(crate) fn credit(&self) -> i64 {
        let mut state = self.state.write();
        state.current_weight += self.weight;
        state.current_weight
    }

    /// Charge a selection round's total weight to this backend.
    pub(crate) fn debit(&self, total_weight: i64) {
        self.state.write().current_weight -= total_weight;
    }

    // --- Bookkeeping ---

    pub fn record_dispatch(&self) {
        self.state.write().requests_total += 1;
    }

    pub fn record_success(&self, latency: Duration) {
        self.state.write().response_time = latency;
    }

    pub fn record_failure(&self) {
        self.state.write().failures_total += 1;
    }

    pub fn snapshot(&self) -> BackendSnapshot {
        let state = self.state.read();
        BackendSnapshot {
            alive: state.alive,
            current_weight: state.current_weight,
            requests_total: state.requests_total,
            failures_total: state.failures_total,
            response_time: state.response_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transports() {
        let http = Transport::parse("http://127.0.0.1:3000").unwrap();
        assert!(matches!(http, Transport::Http(ref url) if url.port() == Some(3000)));

        let unix = Transport::parse("unix:///run/app.sock").unwrap();
        assert_eq!(unix, Transport::UnixSocket(PathBuf::from("/run/app.sock")));
        assert!(unix.is_unix_socket());
        assert_eq!(unix.to_string(), "unix:///run/app.sock");

        assert!(Transport::parse("::not a url").is_err());
    }

    #[test]
    fn origin_host_includes_explicit_port_only() {
        let b = Backend::new("b", Transport::parse("http://10.0.0.5:8000").unwrap(), 1, Duration::from_secs(1));
        assert_eq!(b.origin_host(), "10.0.0.5:8000");

        let b = Backend::new("b", Transport::parse("http://app.internal").unwrap(), 1, Duration::from_secs(1));
        assert_eq!(b.origin_host(), "app.internal");

        let b = Backend::new("b", Transport::parse("unix:///tmp/a.sock").unwrap(), 1, Duration::from_secs(1));
        assert_eq!(b.origin_host(), UNIX_ORIGIN_HOST);
    }

    #[test]
    fn from_config_assigns_index_id_and_default_timeout() {
        let config = BackendConfig::new("http://127.0.0.1:3000", 4, Duration::ZERO);
        let backend = Backend::from_config(7, &config).unwrap();
        assert_eq!(backend.id(), "backend-7");
        assert_eq!(backend.weight(), 4);
        assert_eq!(backend.current_weight(), 4);
        assert_eq!(backend.timeout(), Duration::from_secs(10));
        assert!(backend.is_alive());
    }

    #[test]
    fn bookkeeping() {
        let b = Backend::new("b", Transport::parse("http://127.0.0.1:1").unwrap(), 2, Duration::from_secs(1));
        b.record_dispatch();
        b.record_dispatch();
        b.record_failure();
        b.record_success(Duration::from_millis(12));
        assert!(b.set_alive(false));
        assert!(!b.set_alive(false));

        let snap = b.snapshot();
        assert_eq!(snap.requests_total, 2);
        assert_eq!(snap.failures_total, 1);
        assert_eq!(snap.response_time, Duration::from_millis(12));
        assert!(!snap.alive);
    }
}
