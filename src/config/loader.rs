//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::BridgeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A `BRIDGE_*` variable that was set but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    pub key: &'static str,
    pub value: String,
}

/// Validated configuration plus the overrides that were skipped on the way.
///
/// Loading runs before logging is set up, so skipped overrides are handed
/// back for the caller to report once a subscriber exists.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BridgeConfig,
    pub ignored: Vec<IgnoredOverride>,
}

impl LoadedConfig {
    pub fn log_ignored(&self) {
        for ignored in &self.ignored {
            tracing::warn!(key = ignored.key, value = %ignored.value, "Ignoring invalid environment override");
        }
    }
}

/// Load, override from environment and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: BridgeConfig = toml::from_str(&content)?;
    finish(config)
}

/// Defaults plus environment overrides, for running without a file.
pub fn load_default() -> Result<LoadedConfig, ConfigError> {
    finish(BridgeConfig::default())
}

fn finish(mut config: BridgeConfig) -> Result<LoadedConfig, ConfigError> {
    let ignored = apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(LoadedConfig { config, ignored })
}

/// Apply `BRIDGE_*` overrides. Unparseable numbers leave the field untouched
/// and are returned.
pub fn apply_env_overrides<F>(config: &mut BridgeConfig, lookup: F) -> Vec<IgnoredOverride>
where
    F: Fn(&str) -> Option<String>,
{
    let mut ignored = Vec::new();
    if let Some(v) = lookup("BRIDGE_UPSTREAM_URL") {
        config.upstream.url = v;
    }
    if let Some(v) = lookup("BRIDGE_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("BRIDGE_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Some(v) = lookup("BRIDGE_REQUEST_TIMEOUT_MS") {
        match v.parse() {
            Ok(ms) => config.requests.timeout_ms = ms,
            Err(_) => ignored.push(IgnoredOverride {
                key: "BRIDGE_REQUEST_TIMEOUT_MS",
                value: v,
            }),
        }
    }
    if let Some(v) = lookup("BRIDGE_RECONNECT_MAX_ATTEMPTS") {
        match v.parse() {
            Ok(n) => config.reconnect.max_attempts = n,
            Err(_) => ignored.push(IgnoredOverride {
                key: "BRIDGE_RECONNECT_MAX_ATTEMPTS",
                value: v,
            }),
        }
    }
    ignored
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_win_over_file() {
        let env: HashMap<&str, &str> = [
            ("BRIDGE_UPSTREAM_URL", "wss://upstream.internal/ws"),
            ("BRIDGE_REQUEST_TIMEOUT_MS", "1500"),
            ("BRIDGE_RECONNECT_MAX_ATTEMPTS", "many"),
        ]
        .into_iter()
        .collect();

        let mut config = BridgeConfig::default();
        let ignored = apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.upstream.url, "wss://upstream.internal/ws");
        assert_eq!(config.requests.timeout_ms, 1500);
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(
            ignored,
            vec![IgnoredOverride {
                key: "BRIDGE_RECONNECT_MAX_ATTEMPTS",
                value: "many".into(),
            }]
        );
    }

    #[test]
    fn every_unparseable_number_is_reported() {
        let env: HashMap<&str, &str> = [
            ("BRIDGE_REQUEST_TIMEOUT_MS", "1.5s"),
            ("BRIDGE_RECONNECT_MAX_ATTEMPTS", "-3"),
            ("BRIDGE_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = BridgeConfig::default();
        let ignored = apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        let keys: Vec<_> = ignored.iter().map(|i| i.key).collect();
        assert_eq!(keys, ["BRIDGE_REQUEST_TIMEOUT_MS", "BRIDGE_RECONNECT_MAX_ATTEMPTS"]);
        assert_eq!(ignored[0].value, "1.5s");
        assert_eq!(config.requests.timeout_ms, BridgeConfig::default().requests.timeout_ms);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn clean_environment_reports_nothing() {
        let mut config = BridgeConfig::default();
        assert!(apply_env_overrides(&mut config, |_| None).is_empty());
    }

    #[test]
    fn load_reports_validation_errors() {
        let path = std::env::temp_dir().join(format!("bridge-config-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[heartbeat]\ninterval_secs = 0\n").unwrap();

        let result = load_config(&path);
        let _ = fs::remove_file(&path);

        match result {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.contains(&ValidationError::Zero {
                    field: "heartbeat.interval_secs"
                }));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_config(Path::new("/nonexistent/bridge.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
