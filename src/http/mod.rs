//! HTTP surface over the bridge.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, request id, trace, limits, security headers)
//!     → handlers.rs (decode body, validate, call the bridge)
//!     → response.rs (BridgeError → status code + JSON body)
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{AppState, HttpServer};
