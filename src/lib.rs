//! SoulLoad: a weighted round-robin HTTP load balancer.
//!
//! Requests are spread over HTTP and Unix-socket backends in proportion
//! to their weights, skipping backends the health monitor has marked
//! dead.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::BackendPool;
