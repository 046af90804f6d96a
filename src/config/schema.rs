//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the load
//! balancer. All types derive Serde traits for deserialization from the
//! JSON config file; durations go through [`crate::config::duration`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration;

/// Timeout applied to a backend when its `timeout` is unset.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Health check period applied when `health_check_interval` is unset.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// The only strategy with an implementation.
pub const WEIGHTED_ROUND_ROBIN: &str = "weighted_round_robin";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Backend definitions, in pool order.
    pub backends: Vec<BackendConfig>,

    /// Public listener settings.
    pub server: ServerConfig,

    /// Scheduling and health check settings.
    pub load_balancing: LoadBalancingConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Reserved. Parsed, not enforced.
    pub security: SecurityConfig,

    /// Reserved. Parsed, not enforced.
    pub cache: CacheConfig,
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// `http://host:port[/base]` or `unix:///path/to/socket`.
    pub address: String,

    /// Weight for weighted round robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Bound on each proxied request and each health probe.
    #[serde(default, with = "duration")]
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(address: impl Into<String>, weight: u32, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            weight,
            timeout,
        }
    }

    /// The configured timeout, or [`DEFAULT_BACKEND_TIMEOUT`] when unset.
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_BACKEND_TIMEOUT
        } else {
            self.timeout
        }
    }
}

fn default_weight() -> u32 {
    1
}

/// Public HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address: `":8080"`, `"8080"` or `"127.0.0.1:8080"`.
    pub port: String,

    /// Bound on receiving request headers. Zero is unbounded.
    #[serde(with = "duration")]
    pub read_timeout: Duration,

    /// Bound on producing response headers. Zero is unbounded.
    #[serde(with = "duration")]
    pub write_timeout: Duration,

    /// Close connections idle for this long. Zero is unbounded.
    #[serde(with = "duration")]
    pub idle_timeout: Duration,

    /// Maximum concurrently accepted connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: ":8080".to_string(),
            read_timeout: Duration::ZERO,
            write_timeout: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            max_connections: 10_000,
        }
    }
}

impl ServerConfig {
    /// Address suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        let port = self.port.trim();
        if let Some(port) = port.strip_prefix(':') {
            format!("0.0.0.0:{}", port)
        } else if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
            format!("0.0.0.0:{}", port)
        } else {
            port.to_string()
        }
    }
}

/// Load balancing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancingConfig {
    /// Accepted for forward compatibility; weighted round robin is always used.
    pub strategy: String,

    /// Health check tick period.
    #[serde(with = "duration")]
    pub health_check_interval: Duration,

    /// Path probed on HTTP backends.
    pub health_check_path: String,
}

impl Default for LoadBalancingConfig {
    fn default() -> Self {
        Self {
            strategy: WEIGHTED_ROUND_ROBIN.to_string(),
            health_check_interval: Duration::ZERO,
            health_check_path: "/landing".to_string(),
        }
    }
}

impl LoadBalancingConfig {
    /// The configured interval, or [`DEFAULT_HEALTH_CHECK_INTERVAL`] when unset.
    pub fn effective_interval(&self) -> Duration {
        if self.health_check_interval.is_zero() {
            DEFAULT_HEALTH_CHECK_INTERVAL
        } else {
            self.health_check_interval
        }
    }

    /// Whether `strategy` names weighted round robin (or is empty).
    pub fn is_known_strategy(&self) -> bool {
        let normalized: String = self
            .strategy
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        normalized.is_empty() || normalized == "weightedroundrobin" || normalized == "wrr"
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Optional bind address for the process-wide Prometheus exporter.
    pub exporter_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            exporter_address: None,
        }
    }
}

/// Reserved abuse-protection settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    pub ddos_threshold: u64,
    pub dos_threshold: u64,
    #[serde(with = "duration")]
    pub ban_duration: Duration,
    #[serde(with = "duration")]
    pub window_size: Duration,
    pub js_challenge_secret: String,
}

/// Reserved response cache settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    pub redis_addr: String,
    #[serde(with = "duration")]
    pub default_ttl: Duration,
}
