//! Upstream connection lifecycle and request multiplexing.
//!
//! # State Transitions
//! ```text
//! Disconnected → Connecting: startup, or reconnect timer fired
//! Connecting → Connected: handshake succeeded (attempts reset, heartbeat started)
//! Connecting → Disconnected: handshake failed (reconnect scheduled)
//! Connected → Disconnected: close, error or missed pong
//!                           (pending rejected, reconnect scheduled)
//! any → Closing: explicit shutdown (terminal, no more reconnects)
//! ```
//!
//! # Design Decisions
//! - One supervisor task owns the connection; there is never more than one
//!   attempt in flight
//! - Heartbeat and reconnect timers live inside the supervisor loop and die
//!   with the state that owns them
//! - Reconnection is fail-stop: after `max_attempts` failures it stops until
//!   the process is restarted
//! - Requests are never queued while disconnected

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use url::Url;

use crate::config::BridgeConfig;
use crate::correlation::Correlator;
use crate::error::{BridgeError, BridgeResult};
use crate::observability::metrics;
use crate::resilience::backoff::reconnect_delay;
use crate::upstream::heartbeat::{Heartbeat, HeartbeatEvent};
use crate::upstream::protocol::{self, Inbound, WireRequest};
use crate::upstream::state::{ConnectionState, ConnectionStats, StatsSnapshot};
use crate::upstream::transport::{Connection, Transport, TransportEvent, TransportHandle};
use crate::upstream::websocket::WsTransport;

/// Timing knobs for the manager, resolved from [`BridgeConfig`].
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub request_timeout: Duration,
    pub reconnect_interval: Duration,
    pub reconnect_max_attempts: u32,
    pub reconnect_max_delay: Option<Duration>,
    pub heartbeat_interval: Duration,
    pub pong_timeout: Duration,
}

impl ManagerSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            request_timeout: config.requests.timeout(),
            reconnect_interval: Duration::from_millis(config.reconnect.interval_ms),
            reconnect_max_attempts: config.reconnect.max_attempts,
            reconnect_max_delay: config.reconnect.max_delay_ms.map(Duration::from_millis),
            heartbeat_interval: Duration::from_secs(config.heartbeat.interval_secs),
            pong_timeout: Duration::from_secs(config.heartbeat.pong_timeout_secs),
        }
    }
}

/// Why a live connection ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectReason {
    Closed { code: u16, reason: String },
    Error(String),
    HeartbeatTimeout,
    Shutdown,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::Closed { code, reason } => write!(f, "closed ({code}) {reason}"),
            DisconnectReason::Error(e) => write!(f, "transport error: {e}"),
            DisconnectReason::HeartbeatTimeout => write!(f, "pong timeout"),
            DisconnectReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Owns the single upstream connection and multiplexes requests over it.
pub struct ConnectionManager<T: Transport = WsTransport> {
    transport: T,
    url: Url,
    settings: ManagerSettings,
    correlator: Correlator,
    stats: ConnectionStats,
    state: watch::Sender<ConnectionState>,
    closing: watch::Sender<bool>,
    current: Mutex<Option<TransportHandle>>,
    reconnect_attempts: AtomicU32,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, url: Url, settings: ManagerSettings, correlator: Correlator) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (closing, _) = watch::channel(false);
        Self {
            transport,
            url,
            settings,
            correlator,
            stats: ConnectionStats::new(),
            state,
            closing,
            current: Mutex::new(None),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn current(&self) -> MutexGuard<'_, Option<TransportHandle>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move to `next` unless already closing; `Closing` is terminal.
    fn set_state(&self, next: ConnectionState) {
        let mut previous = next;
        let changed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closing || *state == next {
                return false;
            }
            previous = *state;
            *state = next;
            true
        });
        if changed {
            tracing::info!(from = %previous, to = %next, "Upstream connection state changed");
            metrics::record_connection_state(next.as_code());
        }
    }

    /// Submit an operation and wait for its settlement.
    ///
    /// Fails immediately with `NotConnected` unless the connection is up;
    /// nothing is queued for later delivery.
    pub async fn submit(&self, method: &str, params: Value) -> BridgeResult<Value> {
        let started = std::time::Instant::now();
        self.stats.record_request();

        let result = self.dispatch(method, params).await;
        match &result {
            Ok(_) => metrics::record_request(method, "ok", started),
            Err(e) => {
                self.stats.record_error();
                metrics::record_request(method, e.kind(), started);
            }
        }
        result
    }

    async fn dispatch(&self, method: &str, params: Value) -> BridgeResult<Value> {
        let current = self.current().clone();
        let handle = match (self.state(), current) {
            (ConnectionState::Connected, Some(handle)) => handle,
            _ => return Err(BridgeError::NotConnected),
        };

        let (id, mut response) =
            self.correlator
                .allocate(method, params.clone(), self.settings.request_timeout);

        let frame = match (WireRequest { id, method, params: &params }).encode() {
            Ok(frame) => frame,
            Err(e) => {
                self.correlator.reject(id, e.clone());
                return Err(e);
            }
        };

        // The write can stall behind a peer that stopped reading; the
        // deadline, sweep or connection loss must still reach the caller.
        tokio::select! {
            biased;
            outcome = &mut response => return outcome,
            sent = handle.send(frame) => match sent {
                Ok(()) => tracing::debug!(id = %id, method, "Request sent"),
                Err(e) => {
                    let error = BridgeError::SendFailure(e.to_string());
                    tracing::warn!(id = %id, method, error = %error, "Failed to send request");
                    // A no-op when another path settled it first; that outcome wins.
                    self.correlator.reject(id, error);
                }
            },
        }

        response.await
    }

    /// Request shutdown: enter `Closing`, close the transport gracefully and
    /// stop reconnecting. The supervisor drains pending requests on its way out.
    pub fn shutdown(&self) {
        self.closing.send_replace(true);
        self.set_state(ConnectionState::Closing);
    }

    /// Connection supervisor. Returns after shutdown or once reconnection
    /// attempts are exhausted.
    pub async fn run(&self) {
        let mut closing = self.closing.subscribe();

        loop {
            if *closing.borrow() {
                break;
            }
            self.set_state(ConnectionState::Connecting);

            let opened = tokio::select! {
                opened = self.transport.open(&self.url) => opened,
                _ = closing_requested(&mut closing) => break,
            };

            match opened {
                Ok(connection) => {
                    self.on_open(&connection);
                    let reason = self.drive(connection, &mut closing).await;
                    let shutting_down = reason == DisconnectReason::Shutdown;
                    self.on_disconnect(reason);
                    if shutting_down {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        url = %self.url,
                        attempt = self.reconnect_attempts(),
                        error = %e,
                        "Upstream connect failed"
                    );
                    self.set_state(ConnectionState::Disconnected);
                }
            }

            let attempts = self.reconnect_attempts();
            if attempts >= self.settings.reconnect_max_attempts {
                tracing::error!(
                    attempts,
                    url = %self.url,
                    "Reconnect attempts exhausted, staying disconnected until restart"
                );
                break;
            }
            let attempt = attempts + 1;
            self.reconnect_attempts.store(attempt, Ordering::SeqCst);
            let delay = reconnect_delay(
                attempt,
                self.settings.reconnect_interval,
                self.settings.reconnect_max_delay,
            );
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = closing_requested(&mut closing) => break,
            }
        }

        // Nothing can settle requests once the supervisor is gone.
        self.correlator.reject_all(BridgeError::ConnectionLost);
        tracing::info!(state = %self.state(), "Connection supervisor stopped");
    }

    fn on_open(&self, connection: &Connection) {
        *self.current() = Some(connection.handle.clone());
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.stats.record_connection();
        metrics::record_connection();
        self.set_state(ConnectionState::Connected);
        tracing::info!(url = %self.url, "Upstream connected");
    }

    /// Process events for one live connection until it ends.
    async fn drive(
        &self,
        connection: Connection,
        closing: &mut watch::Receiver<bool>,
    ) -> DisconnectReason {
        let Connection {
            handle,
            mut events,
        } = connection;
        let mut heartbeat = Heartbeat::new(self.settings.heartbeat_interval, self.settings.pong_timeout);

        loop {
            tokio::select! {
                _ = closing_requested(closing) => {
                    handle.close();
                    return DisconnectReason::Shutdown;
                }
                event = events.recv() => match event {
                    Some(TransportEvent::Message(frame)) => self.handle_frame(&frame),
                    Some(TransportEvent::Pong) => heartbeat.on_pong(),
                    Some(TransportEvent::Error(e)) => return DisconnectReason::Error(e),
                    Some(TransportEvent::Closed { code, reason }) => {
                        return DisconnectReason::Closed { code, reason };
                    }
                    None => {
                        return DisconnectReason::Closed {
                            code: 1006,
                            reason: "transport ended".to_string(),
                        };
                    }
                },
                beat = heartbeat.next() => match beat {
                    HeartbeatEvent::Ping => {
                        if let Err(e) = handle.ping() {
                            return DisconnectReason::Error(e.to_string());
                        }
                    }
                    HeartbeatEvent::Expired => {
                        tracing::warn!(
                            pong_timeout_ms = self.settings.pong_timeout.as_millis() as u64,
                            "No pong from upstream, terminating connection"
                        );
                        handle.terminate();
                        return DisconnectReason::HeartbeatTimeout;
                    }
                },
            }
        }
    }

    fn on_disconnect(&self, reason: DisconnectReason) {
        let handle = self.current().take();
        let shutting_down = reason == DisconnectReason::Shutdown;

        if !shutting_down {
            if let Some(handle) = handle {
                handle.terminate();
            }
            self.set_state(ConnectionState::Disconnected);
        }

        let failed = self.correlator.reject_all(BridgeError::ConnectionLost);

        if shutting_down {
            tracing::info!(failed, "Upstream connection closed for shutdown");
        } else {
            self.stats.record_reconnection();
            metrics::record_reconnection();
            tracing::warn!(reason = %reason, failed, "Upstream connection lost");
        }
    }

    fn handle_frame(&self, frame: &[u8]) {
        match protocol::decode(frame) {
            Ok(Inbound::Result { id, result }) => {
                self.correlator.resolve(id, result);
            }
            Ok(Inbound::Error { id, error }) => {
                tracing::debug!(id = %id, error = %error, "Upstream rejected request");
                self.correlator.reject(id, error);
            }
            Ok(Inbound::Uncorrelated) => {
                tracing::debug!("Dropping upstream frame without correlation id");
            }
            Err(e) => {
                tracing::warn!(error = %e, len = frame.len(), "Dropping malformed upstream frame");
                metrics::record_malformed_frame();
            }
        }
    }
}

async fn closing_requested(closing: &mut watch::Receiver<bool>) {
    // An error means the manager itself is gone, which is closing too.
    let _ = closing.wait_for(|closing| *closing).await;
}

impl<T: Transport> std::fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url.as_str())
            .field("state", &self.state())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish()
    }
}
