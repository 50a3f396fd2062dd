//! Shutdown coordination for background tasks.

use tokio::sync::broadcast;

/// Broadcast coordinator every long-running task subscribes to.
///
/// Subscribe before spawning a task so the signal cannot be missed.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber. Idempotent.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of subscribed tasks that have not yet dropped their receiver.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
