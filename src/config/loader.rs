//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse and validate configuration from JSON text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = serde_json::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FULL: &str = r#"{
        "backends": [
            {"address": "http://127.0.0.1:3000", "weight": 3, "timeout": "2s"},
            {"address": "unix:///run/app.sock", "timeout": "500ms"}
        ],
        "security": {
            "ddos_threshold": 1000,
            "dos_threshold": 100,
            "ban_duration": "1h",
            "window_size": "1m",
            "js_challenge_secret": "s3cret"
        },
        "cache": {"redis_addr": "127.0.0.1:6379", "default_ttl": "5m"},
        "load_balancing": {"strategy": "weighted_round_robin", "health_check_interval": "10s"},
        "server": {
            "port": ":8080",
            "read_timeout": "30s",
            "write_timeout": "30s",
            "idle_timeout": ""
        }
    }"#;

    #[test]
    fn parses_full_document() {
        let config = parse_config(FULL).unwrap();

        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].weight, 3);
        assert_eq!(config.backends[0].timeout, Duration::from_secs(2));
        assert_eq!(config.backends[1].weight, 1);
        assert_eq!(config.backends[1].timeout, Duration::from_millis(500));

        assert_eq!(config.server.read_timeout, Duration::from_secs(30));
        assert_eq!(config.server.write_timeout, Duration::from_secs(30));
        assert_eq!(config.server.idle_timeout, Duration::ZERO);
        assert_eq!(config.load_balancing.health_check_interval, Duration::from_secs(10));

        assert_eq!(config.security.ban_duration, Duration::from_secs(3600));
        assert_eq!(config.cache.default_ttl, Duration::from_secs(300));
    }

    #[test]
    fn malformed_duration_fails_the_load() {
        let json = r#"{"backends": [{"address": "http://127.0.0.1:3000", "timeout": "2 seconds"}]}"#;
        assert!(matches!(parse_config(json), Err(ConfigError::Parse(_))));

        let json = r#"{
            "backends": [{"address": "http://127.0.0.1:3000"}],
            "cache": {"default_ttl": "soon"}
        }"#;
        assert!(matches!(parse_config(json), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn null_durations_fall_back_to_defaults() {
        let json = r#"{
            "backends": [{"address": "http://127.0.0.1:3000", "timeout": null}],
            "load_balancing": {"health_check_interval": null},
            "server": {"read_timeout": null, "idle_timeout": null}
        }"#;
        let config = parse_config(json).unwrap();

        assert_eq!(config.backends[0].timeout, Duration::ZERO);
        assert_eq!(config.backends[0].effective_timeout(), Duration::from_secs(10));
        assert_eq!(config.load_balancing.health_check_interval, Duration::ZERO);
        assert_eq!(config.server.read_timeout, Duration::ZERO);
        assert_eq!(config.server.idle_timeout, Duration::ZERO);
    }

    #[test]
    fn unknown_strategy_is_accepted() {
        let json = r#"{
            "backends": [{"address": "http://127.0.0.1:3000"}],
            "load_balancing": {"strategy": "least_connections"}
        }"#;
        let config = parse_config(json).unwrap();
        assert!(!config.load_balancing.is_known_strategy());
    }

    #[test]
    fn invalid_backend_url_is_fatal() {
        let json = r#"{"backends": [{"address": "http//missing-colon"}]}"#;
        match parse_config(json) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("soulload-config-{}.json", std::process::id()));
        fs::write(&path, FULL).unwrap();
        let config = load_config(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.backends.len(), 2);

        let missing = load_config(Path::new("/nonexistent/soulload.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
