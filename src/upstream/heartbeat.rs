//! Ping/pong liveness check for a live connection.
//!
//! # State Transitions
//! ```text
//! idle ──tick──▶ awaiting pong (ping sent, deadline armed)
//! awaiting pong ──pong──▶ idle
//! awaiting pong ──deadline──▶ expired (connection is dead)
//! ```
//!
//! A tick while a pong is still outstanding does not re-arm the deadline.
//! The check is owned by one live connection and dropped with it.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::config::HeartbeatConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Send a ping now.
    Ping,
    /// No pong arrived within the timeout.
    Expired,
}

#[derive(Debug)]
pub struct Heartbeat {
    ticker: Interval,
    pong_timeout: Duration,
    pong_deadline: Option<Instant>,
}

impl Heartbeat {
    pub fn new(interval: Duration, pong_timeout: Duration) -> Self {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            pong_timeout,
            pong_deadline: None,
        }
    }

    pub fn from_config(config: &HeartbeatConfig) -> Self {
        Self::new(
            Duration::from_secs(config.interval_secs),
            Duration::from_secs(config.pong_timeout_secs),
        )
    }

    /// Wait for the next thing the connection has to act on. Cancel-safe.
    pub async fn next(&mut self) -> HeartbeatEvent {
        loop {
            let deadline = self.pong_deadline;
            tokio::select! {
                _ = self.ticker.tick() => {
                    if self.pong_deadline.is_none() {
                        self.pong_deadline = Some(Instant::now() + self.pong_timeout);
                        return HeartbeatEvent::Ping;
                    }
                }
                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.pong_deadline = None;
                    return HeartbeatEvent::Expired;
                }
            }
        }
    }

    pub fn on_pong(&mut self) {
        self.pong_deadline = None;
    }

    pub fn awaiting_pong(&self) -> bool {
        self.pong_deadline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pings_on_interval_while_pongs_arrive() {
        let start = Instant::now();
        let mut heartbeat = Heartbeat::new(Duration::from_secs(15), Duration::from_secs(7));

        for round in 1..=3u64 {
            assert_eq!(heartbeat.next().await, HeartbeatEvent::Ping);
            assert_eq!(start.elapsed(), Duration::from_secs(15 * round));
            assert!(heartbeat.awaiting_pong());
            time::sleep(Duration::from_secs(1)).await;
            heartbeat.on_pong();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expires_without_pong() {
        let start = Instant::now();
        let mut heartbeat = Heartbeat::new(Duration::from_secs(15), Duration::from_secs(7));

        assert_eq!(heartbeat.next().await, HeartbeatEvent::Ping);
        assert_eq!(heartbeat.next().await, HeartbeatEvent::Expired);
        assert_eq!(start.elapsed(), Duration::from_secs(22));
    }

    #[tokio::test(start_paused = true)]
    async fn outstanding_ping_is_not_rearmed() {
        let start = Instant::now();
        let mut heartbeat = Heartbeat::new(Duration::from_secs(5), Duration::from_secs(12));

        assert_eq!(heartbeat.next().await, HeartbeatEvent::Ping);
        // Ticks at 10s and 15s pass silently; the 5s+12s deadline still holds.
        assert_eq!(heartbeat.next().await, HeartbeatEvent::Expired);
        assert_eq!(start.elapsed(), Duration::from_secs(17));
    }
}
