//! Upstream connection subsystem.
//!
//! # Data Flow
//! ```text
//! submit(method, params)
//!     → manager.rs (state check, allocate id, encode via protocol.rs)
//!     → transport.rs handle → websocket.rs writer → upstream
//!
//! upstream frame
//!     → websocket.rs reader → TransportEvent
//!     → manager.rs (decode, resolve/reject in the correlator)
//!
//! heartbeat.rs ping/pong ──missed pong──▶ terminate → reconnect
//! ```
//!
//! # Design Decisions
//! - Exactly one long-lived connection per bridge
//! - The transport is a trait so the state machine can run against an
//!   in-memory peer

pub mod heartbeat;
pub mod manager;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod websocket;

pub use manager::{ConnectionManager, DisconnectReason, ManagerSettings};
pub use state::{ConnectionState, ConnectionStats, StatsSnapshot};
pub use transport::{Connection, Transport, TransportError, TransportEvent, TransportHandle};
pub use websocket::WsTransport;
