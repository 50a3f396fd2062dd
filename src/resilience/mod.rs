//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Idempotent operation:
//!     → retries.rs (retryable error? wait, then submit again)
//!     → backoff.rs (delay for attempt k, capped, optional jitter)
//!
//! Connection supervisor:
//!     → backoff.rs (reconnect delay, interval * 2^(k-1))
//! ```
//!
//! # Design Decisions
//! - Every request carries a deadline; retries never extend a single attempt
//! - Only transport-level failures are retried, never upstream rejections

pub mod backoff;
pub mod retries;

pub use retries::{RetryPolicy, RetryingSender};
