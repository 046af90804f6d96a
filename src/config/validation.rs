//! Configuration validation.
//!
//! Serde handles the syntax; this module checks the semantics. Every
//! violation is collected so a broken file can be fixed in one pass.

use url::Url;

use crate::config::schema::ProxyConfig;

/// Unix socket address prefix.
pub const UNIX_PREFIX: &str = "unix://";

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,
    #[error("backend {index}: weight must be at least 1")]
    ZeroWeight { index: usize },
    #[error("backend {index}: unix socket address has an empty path")]
    EmptySocketPath { index: usize },
    #[error("backend {index}: invalid backend URL {address:?}: {reason}")]
    InvalidUrl {
        index: usize,
        address: String,
        reason: String,
    },
    #[error("server.port must not be empty")]
    EmptyPort,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    for (index, backend) in config.backends.iter().enumerate() {
        if backend.weight == 0 {
            errors.push(ValidationError::ZeroWeight { index });
        }

        if let Some(path) = backend.address.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                errors.push(ValidationError::EmptySocketPath { index });
            }
            continue;
        }

        if let Err(reason) = check_http_url(&backend.address) {
            errors.push(ValidationError::InvalidUrl {
                index,
                address: backend.address.clone(),
                reason,
            });
        }
    }

    if config.server.port.trim().is_empty() {
        errors.push(ValidationError::EmptyPort);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(address: &str) -> Result<(), String> {
    let url = Url::parse(address).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme {:?}", url.scheme()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".to_string());
    }
    Ok(())
}
