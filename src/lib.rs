//! Resilient bridge to a single upstream WebSocket service.
//!
//! Multiplexes concurrent request/response operations over one long-lived
//! connection, correlating replies by id, reconnecting with exponential
//! backoff and probing liveness with ping/pong.

pub mod bridge;
pub mod config;
pub mod correlation;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use bridge::{Bridge, BridgeStatus};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use lifecycle::Shutdown;
