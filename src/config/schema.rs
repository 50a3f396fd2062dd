//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP listener configuration.
    pub listener: ListenerConfig,

    /// Upstream endpoint and transport settings.
    pub upstream: UpstreamConfig,

    /// Per-request settings.
    pub requests: RequestConfig,

    /// Retry policy for retry-safe operations.
    pub retries: RetryConfig,

    /// Reconnection policy.
    pub reconnect: ReconnectConfig,

    /// Liveness probing of the upstream connection.
    pub heartbeat: HeartbeatConfig,

    /// Stale request reclamation.
    pub sweep: SweepConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// HTTP hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream connection target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// WebSocket URL of the upstream service (`ws://` or `wss://`).
    pub url: String,

    /// Handshake timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Capacity of the outbound frame queue.
    pub outbound_buffer: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9000".to_string(),
            connect_timeout_secs: 10,
            outbound_buffer: 256,
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Per-request settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Time a request may stay pending before it fails with a timeout.
    pub timeout_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries for retry-safe operations.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,

    /// Upper bound for a single retry delay in milliseconds.
    pub max_delay_ms: u64,

    /// Random jitter added to each retry delay, as a fraction of it.
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_factor: 2.0,
            max_delay_ms: 10_000,
            jitter_ratio: 0.0,
        }
    }
}

/// Reconnection policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Base delay between reconnect attempts in milliseconds.
    pub interval_ms: u64,

    /// Attempts after which reconnection stops for good.
    pub max_attempts: u32,

    /// Optional cap on a single reconnect delay in milliseconds.
    pub max_delay_ms: Option<u64>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: 10,
            max_delay_ms: None,
        }
    }
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Seconds between pings while connected.
    pub interval_secs: u64,

    /// Seconds to wait for a pong before the connection is declared dead.
    pub pong_timeout_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            pong_timeout_secs: 7,
        }
    }
}

/// Stale request sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Seconds between sweeps.
    pub interval_secs: u64,

    /// Age in seconds after which a pending request is reclaimed.
    pub max_age_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            max_age_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Overall HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 1024 * 1024, // 1MB
            request_timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [upstream]
            url = "wss://quotes.example.com/ws"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.url, "wss://quotes.example.com/ws");
        assert_eq!(config.upstream.connect_timeout_secs, 10);
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.reconnect.max_delay_ms, None);
        assert_eq!(config.heartbeat.interval_secs, 15);
        assert_eq!(config.heartbeat.pong_timeout_secs, 7);
        assert_eq!(config.sweep.max_age_secs, 300);
        assert_eq!(config.retries.max_attempts, 3);
    }

    #[test]
    fn reconnect_cap_is_optional() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [reconnect]
            interval_ms = 250
            max_delay_ms = 4000
            "#,
        )
        .unwrap();

        assert_eq!(config.reconnect.interval_ms, 250);
        assert_eq!(config.reconnect.max_delay_ms, Some(4000));
        assert_eq!(config.reconnect.max_attempts, 10);
    }
}
