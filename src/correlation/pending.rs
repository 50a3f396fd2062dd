//! Pending request records and the caller-side completion future.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::error::{BridgeError, BridgeResult};

/// Correlation id carried on the wire as `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CorrelationId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request awaiting its response.
///
/// Lives in the correlator map from allocation until the first of
/// resolve, reject, deadline, sweep or connection loss removes it.
#[derive(Debug)]
pub struct PendingRequest {
    pub id: CorrelationId,
    pub method: String,
    pub params: Value,
    pub created_at: Instant,
    /// `None` when the timeout is too large to represent.
    pub deadline: Option<Instant>,
    pub(crate) completion: oneshot::Sender<BridgeResult<Value>>,
    pub(crate) deadline_timer: Option<AbortHandle>,
}

impl PendingRequest {
    /// Settle the caller and cancel the deadline timer. Consumes the record,
    /// so a request can only ever be settled once.
    pub(crate) fn settle(self, outcome: BridgeResult<Value>) {
        if let Some(timer) = self.deadline_timer {
            timer.abort();
        }
        if self.completion.send(outcome).is_err() {
            tracing::trace!(id = %self.id, method = %self.method, "Caller went away before settlement");
        }
    }
}

/// Future handed to the caller of `allocate`.
#[derive(Debug)]
pub struct PendingResponse {
    rx: oneshot::Receiver<BridgeResult<Value>>,
}

impl PendingResponse {
    pub(crate) fn new(rx: oneshot::Receiver<BridgeResult<Value>>) -> Self {
        Self { rx }
    }
}

impl Future for PendingResponse {
    type Output = BridgeResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // The sender is only dropped without a value if the correlator itself
        // was torn down, which is a lost connection from the caller's view.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(BridgeError::ConnectionLost)))
    }
}
