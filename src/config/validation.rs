//! Configuration validation.
//!
//! Serde handles syntax; this module checks values: the upstream URL is a
//! WebSocket URL, addresses parse, and every interval the bridge arms a timer
//! with is non-zero. All violations are reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::BridgeConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL '{value}': {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.upstream.url) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
        Ok(url) => errors.push(ValidationError::InvalidUrl {
            field: "upstream.url",
            value: config.upstream.url.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidUrl {
            field: "upstream.url",
            value: config.upstream.url.clone(),
            reason: e.to_string(),
        }),
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let non_zero: [(&'static str, u64); 10] = [
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
        ("upstream.outbound_buffer", config.upstream.outbound_buffer as u64),
        ("requests.timeout_ms", config.requests.timeout_ms),
        ("retries.max_attempts", config.retries.max_attempts as u64),
        ("reconnect.interval_ms", config.reconnect.interval_ms),
        ("reconnect.max_attempts", config.reconnect.max_attempts as u64),
        ("heartbeat.interval_secs", config.heartbeat.interval_secs),
        ("heartbeat.pong_timeout_secs", config.heartbeat.pong_timeout_secs),
        ("sweep.interval_secs", config.sweep.interval_secs),
        ("sweep.max_age_secs", config.sweep.max_age_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.retries.backoff_factor < 1.0 || !config.retries.backoff_factor.is_finite() {
        errors.push(ValidationError::OutOfRange {
            field: "retries.backoff_factor",
            reason: format!("must be >= 1.0, got {}", config.retries.backoff_factor),
        });
    }
    if config.retries.max_delay_ms < config.retries.base_delay_ms {
        errors.push(ValidationError::OutOfRange {
            field: "retries.max_delay_ms",
            reason: "must not be smaller than retries.base_delay_ms".to_string(),
        });
    }
    if let Some(cap) = config.reconnect.max_delay_ms {
        if cap < config.reconnect.interval_ms {
            errors.push(ValidationError::OutOfRange {
                field: "reconnect.max_delay_ms",
                reason: "must not be smaller than reconnect.interval_ms".to_string(),
            });
        }
    }
    if config.sweep.max_age_secs.saturating_mul(1000) < config.requests.timeout_ms {
        errors.push(ValidationError::OutOfRange {
            field: "sweep.max_age_secs",
            reason: "stale threshold is shorter than requests.timeout_ms".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
