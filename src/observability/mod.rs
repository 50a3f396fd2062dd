//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! correlation / upstream / resilience
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout log stream
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
