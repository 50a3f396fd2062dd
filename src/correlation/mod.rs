//! Request correlation subsystem.
//!
//! # Data Flow
//! ```text
//! submit(method, params)
//!     → correlator.rs (allocate id, store pending record, arm deadline)
//!     → caller awaits PendingResponse
//!
//! Inbound response / deadline / sweeper.rs / connection loss
//!     → correlator.rs (remove record under the lock)
//!     → pending.rs (settle the caller exactly once)
//! ```

pub mod correlator;
pub mod pending;
pub mod sweeper;

pub use correlator::Correlator;
pub use pending::{CorrelationId, PendingRequest, PendingResponse};
pub use sweeper::Sweeper;
