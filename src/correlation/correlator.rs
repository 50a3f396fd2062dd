//! Correlation id allocation and pending request bookkeeping.
//!
//! # Responsibilities
//! - Generate correlation ids unique among outstanding requests
//! - Hold every pending request until exactly one settlement path claims it
//! - Arm a per-request deadline timer
//! - Reclaim stale entries on sweep, drain everything on connection loss
//!
//! # Design Decisions
//! - One mutex around the whole map; every mutation goes through it, so a
//!   deadline firing and a response arriving for the same id cannot both win
//! - Settlement happens outside the lock
//! - No network awareness

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::correlation::pending::{CorrelationId, PendingRequest, PendingResponse};
use crate::error::{BridgeError, BridgeResult};
use crate::observability::metrics;

/// Shared handle to the pending request table.
#[derive(Clone, Default)]
pub struct Correlator {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    pending: Mutex<HashMap<CorrelationId, PendingRequest>>,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, HashMap<CorrelationId, PendingRequest>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take(&self, id: CorrelationId) -> Option<PendingRequest> {
        let mut pending = self.pending();
        let request = pending.remove(&id);
        metrics::record_pending(pending.len());
        request
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending request and return the future its caller awaits.
    ///
    /// Must be called from within a Tokio runtime: the deadline timer is a
    /// spawned task that rejects the request with `Timeout` when it fires.
    pub fn allocate(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> (CorrelationId, PendingResponse) {
        let id = CorrelationId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = oneshot::channel();
        let created_at = Instant::now();
        let deadline = created_at.checked_add(timeout);

        let mut pending = self.inner.pending();
        let deadline_timer = deadline.map(|deadline| {
            let inner: Weak<Inner> = Arc::downgrade(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                if let Some(inner) = inner.upgrade() {
                    if let Some(request) = inner.take(id) {
                        tracing::warn!(id = %id, method = %request.method, ?timeout, "Request timed out");
                        request.settle(Err(BridgeError::Timeout(timeout)));
                    }
                }
            })
            .abort_handle()
        });

        let previous = pending.insert(
            id,
            PendingRequest {
                id,
                method: method.to_string(),
                params,
                created_at,
                deadline,
                completion: tx,
                deadline_timer,
            },
        );
        debug_assert!(previous.is_none(), "correlation id {id} reused while pending");
        metrics::record_pending(pending.len());

        (id, PendingResponse::new(rx))
    }

    /// Settle a pending request with its result. Returns false for unknown
    /// or already-settled ids.
    pub fn resolve(&self, id: CorrelationId, result: Value) -> bool {
        self.settle(id, Ok(result))
    }

    /// Settle a pending request with a failure. Returns false for unknown
    /// or already-settled ids.
    pub fn reject(&self, id: CorrelationId, error: BridgeError) -> bool {
        self.settle(id, Err(error))
    }

    fn settle(&self, id: CorrelationId, outcome: BridgeResult<Value>) -> bool {
        match self.inner.take(id) {
            Some(request) => {
                request.settle(outcome);
                true
            }
            None => {
                tracing::debug!(id = %id, "No pending request for id, dropping");
                false
            }
        }
    }

    /// Fail every pending request with the same error. Requests allocated
    /// after the drain are unaffected. Returns how many were settled.
    pub fn reject_all(&self, error: BridgeError) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut pending = self.inner.pending();
            let drained = pending.drain().map(|(_, request)| request).collect();
            metrics::record_pending(0);
            drained
        };

        let count = drained.len();
        for request in drained {
            request.settle(Err(error.clone()));
        }
        if count > 0 {
            tracing::info!(count, error = %error, "Rejected all pending requests");
        }
        count
    }

    /// Reject every request older than `max_age` with `Timeout`, regardless
    /// of its own deadline. Returns how many were reclaimed.
    pub fn sweep(&self, now: Instant, max_age: Duration) -> usize {
        let stale: Vec<PendingRequest> = {
            let mut pending = self.inner.pending();
            let ids: Vec<CorrelationId> = pending
                .values()
                .filter(|r| now.saturating_duration_since(r.created_at) > max_age)
                .map(|r| r.id)
                .collect();
            let stale = ids.iter().filter_map(|id| pending.remove(id)).collect();
            metrics::record_pending(pending.len());
            stale
        };

        let count = stale.len();
        for request in stale {
            let age = now.saturating_duration_since(request.created_at);
            tracing::warn!(id = %request.id, method = %request.method, ?age, "Sweeping stale request");
            request.settle(Err(BridgeError::Timeout(age)));
        }
        if count > 0 {
            metrics::record_swept(count);
        }
        count
    }

    /// Whether `id` is still pending.
    pub fn contains(&self, id: CorrelationId) -> bool {
        self.inner.pending().contains_key(&id)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.inner.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    const LONG: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn ids_are_unique_among_pending() {
        let correlator = Correlator::new();
        let mut seen = HashSet::new();
        let mut futures = Vec::new();

        for _ in 0..1000 {
            let (id, fut) = correlator.allocate("quote", json!({}), LONG);
            assert!(seen.insert(id), "duplicate id {id}");
            futures.push(fut);
        }
        assert_eq!(correlator.len(), 1000);

        // Settle half, allocate more; the fresh ids never collide with survivors.
        for id in seen.iter().copied().filter(|id| id.as_u64() % 2 == 0).collect::<Vec<_>>() {
            assert!(correlator.resolve(id, json!(null)));
        }
        for _ in 0..500 {
            let (id, fut) = correlator.allocate("quote", json!({}), LONG);
            assert!(!seen.contains(&id));
            assert!(correlator.contains(id));
            futures.push(fut);
        }
    }

    #[tokio::test]
    async fn resolve_settles_once() {
        let correlator = Correlator::new();
        let (id, fut) = correlator.allocate("quote", json!({"send_amount": 1}), LONG);

        assert!(correlator.resolve(id, json!({"recv_amount": 2})));
        assert!(!correlator.resolve(id, json!({"recv_amount": 3})));
        assert!(!correlator.reject(id, BridgeError::ConnectionLost));

        assert_eq!(fut.await, Ok(json!({"recv_amount": 2})));
        assert!(correlator.is_empty());
    }

    #[tokio::test]
    async fn reject_surfaces_error() {
        let correlator = Correlator::new();
        let (id, fut) = correlator.allocate("swap", json!({}), LONG);
        let err = BridgeError::upstream(400, "insufficient liquidity");

        assert!(correlator.reject(id, err.clone()));
        assert_eq!(fut.await, Err(err));
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored() {
        let correlator = Correlator::new();
        assert!(!correlator.resolve(CorrelationId::new(42), json!({})));
        assert!(!correlator.reject(CorrelationId::new(42), BridgeError::ConnectionLost));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_rejects_with_timeout() {
        let correlator = Correlator::new();
        let timeout = Duration::from_millis(500);
        let (id, fut) = correlator.allocate("quote", json!({}), timeout);

        assert_eq!(fut.await, Err(BridgeError::Timeout(timeout)));
        assert!(!correlator.contains(id));
        assert!(!correlator.resolve(id, json!({})));
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_before_deadline_cancels_timer() {
        let correlator = Correlator::new();
        let (id, fut) = correlator.allocate("quote", json!({}), Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(correlator.resolve(id, json!("ok")));
        assert_eq!(fut.await, Ok(json!("ok")));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(correlator.is_empty());
    }

    #[tokio::test]
    async fn reject_all_drains_every_request() {
        let correlator = Correlator::new();
        let futures: Vec<_> = (0..5)
            .map(|_| correlator.allocate("quote", json!({}), LONG).1)
            .collect();

        assert_eq!(correlator.reject_all(BridgeError::ConnectionLost), 5);
        assert!(correlator.is_empty());

        for fut in futures {
            assert_eq!(fut.await, Err(BridgeError::ConnectionLost));
        }

        // Allocations after the drain are untouched.
        let (id, _fut) = correlator.allocate("quote", json!({}), LONG);
        assert!(correlator.contains(id));
        assert_eq!(correlator.reject_all(BridgeError::ConnectionLost), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_reclaims_entries_whose_deadline_never_fires() {
        let correlator = Correlator::new();
        let (stale, stale_fut) = correlator.allocate("quote", json!({}), Duration::MAX);

        tokio::time::sleep(Duration::from_secs(301)).await;
        let (fresh, _fresh_fut) = correlator.allocate("quote", json!({}), Duration::MAX);

        let swept = correlator.sweep(Instant::now(), Duration::from_secs(300));
        assert_eq!(swept, 1);
        assert!(!correlator.contains(stale));
        assert!(correlator.contains(fresh));
        assert!(matches!(stale_fut.await, Err(BridgeError::Timeout(age)) if age > Duration::from_secs(300)));
    }
}
