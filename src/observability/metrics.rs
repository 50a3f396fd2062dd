//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_requests_total` (counter): submitted operations by method, outcome
//! - `bridge_request_duration_seconds` (histogram): submit-to-settle latency
//! - `bridge_pending_requests` (gauge): entries in the correlator
//! - `bridge_connection_state` (gauge): 0=disconnected 1=connecting 2=connected 3=closing
//! - `bridge_connections_total`, `bridge_reconnections_total` (counters)
//! - `bridge_malformed_frames_total`, `bridge_swept_requests_total`,
//!   `bridge_retries_total` (counters)
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a settled operation.
pub fn record_request(method: &str, outcome: &'static str, start: Instant) {
    counter!("bridge_requests_total", "method" => method.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("bridge_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_pending(count: usize) {
    gauge!("bridge_pending_requests").set(count as f64);
}

pub fn record_connection_state(code: u8) {
    gauge!("bridge_connection_state").set(f64::from(code));
}

pub fn record_connection() {
    counter!("bridge_connections_total").increment(1);
}

pub fn record_reconnection() {
    counter!("bridge_reconnections_total").increment(1);
}

pub fn record_malformed_frame() {
    counter!("bridge_malformed_frames_total").increment(1);
}

pub fn record_swept(count: usize) {
    counter!("bridge_swept_requests_total").increment(count as u64);
}

pub fn record_retry(method: &str) {
    counter!("bridge_retries_total", "method" => method.to_string()).increment(1);
}
