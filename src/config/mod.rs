//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON)
//!     → loader.rs (read & deserialize)
//!     → duration.rs (duration strings → Duration)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Loaded once at startup; there is no reload
//! - All sections have defaults to allow minimal configs
//! - A half-parsed config never reaches the rest of the system

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackendConfig, LoadBalancingConfig, ObservabilityConfig, ProxyConfig, ServerConfig,
};
