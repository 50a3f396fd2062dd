//! Periodic reclamation of stale pending requests.
//!
//! Independent of the per-request deadline timers: if a timer never fires,
//! the sweep still removes the entry once it is older than `max_age`.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::SweepConfig;
use crate::correlation::Correlator;

pub struct Sweeper {
    correlator: Correlator,
    interval: Duration,
    max_age: Duration,
}

impl Sweeper {
    pub fn new(correlator: Correlator, config: &SweepConfig) -> Self {
        Self {
            correlator,
            interval: Duration::from_secs(config.interval_secs),
            max_age: Duration::from_secs(config.max_age_secs),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Request sweeper starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let swept = self.correlator.sweep(Instant::now(), self.max_age);
                    if swept > 0 {
                        tracing::warn!(swept, "Reclaimed stale requests");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Request sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn sweeper_reclaims_on_its_own_schedule() {
        let correlator = Correlator::new();
        let (tx, rx) = broadcast::channel(1);
        let config = SweepConfig {
            interval_secs: 10,
            max_age_secs: 30,
        };
        let handle = tokio::spawn(Sweeper::new(correlator.clone(), &config).run(rx));

        let start = Instant::now();
        let (id, fut) = correlator.allocate("quote", json!({}), Duration::MAX);

        time::sleep(Duration::from_secs(25)).await;
        assert!(correlator.contains(id));

        assert!(matches!(fut.await, Err(BridgeError::Timeout(_))));
        assert!(correlator.is_empty());
        // Age is exactly 30s at the third tick, so the fourth one reclaims it.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(40) && elapsed < Duration::from_secs(41));

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
