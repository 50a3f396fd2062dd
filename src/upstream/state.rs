//! Connection state and process-wide connection statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Lifecycle state of the upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection; a reconnect may be scheduled.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Handshake complete, heartbeat running, requests accepted.
    Connected,
    /// Explicit shutdown requested. Terminal.
    Closing,
}

impl ConnectionState {
    /// Numeric code for the state gauge.
    pub fn as_code(&self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Closing => 3,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Monotonic counters. Relaxed ordering is enough: each counter is read
/// independently for reporting only.
#[derive(Debug)]
pub struct ConnectionStats {
    total_connections: AtomicU64,
    total_reconnections: AtomicU64,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    process_start_time: SystemTime,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            total_reconnections: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            process_start_time: SystemTime::now(),
        }
    }

    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnection(&self) {
        self.total_reconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let start_secs = self
            .process_start_time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            total_reconnections: self.total_reconnections.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            process_start_time: start_secs,
            uptime_secs: self.process_start_time.elapsed().unwrap_or_default().as_secs(),
        }
    }
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ConnectionStats`] for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_connections: u64,
    pub total_reconnections: u64,
    pub total_requests: u64,
    pub total_errors: u64,
    /// Unix timestamp in seconds.
    pub process_start_time: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ConnectionStats::new();
        stats.record_connection();
        stats.record_connection();
        stats.record_reconnection();
        stats.record_request();
        stats.record_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.total_reconnections, 1);
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.total_errors, 1);
        assert!(snapshot.process_start_time > 0);
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionState::Connected).unwrap();
        assert_eq!(json, "\"connected\"");
        assert_eq!(ConnectionState::Closing.to_string(), "closing");
    }
}
