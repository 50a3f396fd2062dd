//! Public facade over the upstream bridge.
//!
//! # Data Flow
//! ```text
//! submit_operation  ──────────────────────▶ ConnectionManager::submit
//! submit_idempotent ──▶ RetryingSender ───▶ ConnectionManager::submit
//!                                               │
//!                        Correlator ◀───────────┘ (allocate / settle)
//!                           ▲
//!                        Sweeper (periodic reclamation)
//! ```
//!
//! # Design Decisions
//! - Callers never see transport details, only `BridgeError`
//! - `start` spawns the connection supervisor and the sweeper; `shutdown`
//!   stops and joins them

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::{BridgeConfig, SweepConfig};
use crate::correlation::{Correlator, Sweeper};
use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::Shutdown;
use crate::resilience::{RetryPolicy, RetryingSender};
use crate::upstream::{
    ConnectionManager, ConnectionState, ManagerSettings, StatsSnapshot, Transport, WsTransport,
};

/// Point-in-time view of the bridge for status endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    pub connected: bool,
    pub state: ConnectionState,
    pub upstream: String,
    pub reconnect_attempts: u32,
    pub pending_requests: usize,
    pub stats: StatsSnapshot,
}

pub struct Bridge<T: Transport = WsTransport> {
    manager: Arc<ConnectionManager<T>>,
    correlator: Correlator,
    retries: Option<RetryingSender>,
    sweep: SweepConfig,
    shutdown: Shutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge<WsTransport> {
    /// Bridge over a WebSocket upstream, as configured.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, url::ParseError> {
        Self::with_transport(WsTransport::from_config(&config.upstream), config)
    }
}

impl<T: Transport> Bridge<T> {
    pub fn with_transport(transport: T, config: &BridgeConfig) -> Result<Self, url::ParseError> {
        let url = Url::parse(&config.upstream.url)?;
        let correlator = Correlator::new();
        let manager = ConnectionManager::new(
            transport,
            url,
            ManagerSettings::from_config(config),
            correlator.clone(),
        );
        let retries = config
            .retries
            .enabled
            .then(|| RetryingSender::new(RetryPolicy::from_config(&config.retries)));

        Ok(Self {
            manager: Arc::new(manager),
            correlator,
            retries,
            sweep: config.sweep.clone(),
            shutdown: Shutdown::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the connection supervisor and the request sweeper.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !tasks.is_empty() {
            tracing::warn!("Bridge already started");
            return;
        }

        let manager = Arc::clone(&self.manager);
        tasks.push(tokio::spawn(async move { manager.run().await }));

        let sweeper = Sweeper::new(self.correlator.clone(), &self.sweep);
        tasks.push(tokio::spawn(sweeper.run(self.shutdown.subscribe())));

        tracing::info!(upstream = %self.manager.url(), "Bridge started");
    }

    /// Submit a single operation. No retries.
    pub async fn submit_operation(&self, method: &str, params: Value) -> BridgeResult<Value> {
        self.manager.submit(method, params).await
    }

    /// Submit an operation that is safe to repeat, retrying transient failures
    /// when retries are enabled.
    pub async fn submit_idempotent(&self, method: &str, params: Value) -> BridgeResult<Value> {
        match &self.retries {
            Some(retries) => {
                retries
                    .send(method, || self.manager.submit(method, params.clone()))
                    .await
            }
            None => self.submit_operation(method, params).await,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn status(&self) -> BridgeStatus {
        let state = self.manager.state();
        BridgeStatus {
            connected: state == ConnectionState::Connected,
            state,
            upstream: self.manager.url().to_string(),
            reconnect_attempts: self.manager.reconnect_attempts(),
            pending_requests: self.correlator.len(),
            stats: self.manager.stats(),
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager<T>> {
        &self.manager
    }

    /// Enter `Closing`, close the upstream gracefully and wait for the
    /// background tasks. Outstanding requests fail with `ConnectionLost`.
    pub async fn shutdown(&self) {
        tracing::info!("Bridge shutting down");
        self.manager.shutdown();
        self.shutdown.trigger();

        let tasks: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            tasks.drain(..).collect()
        };
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Bridge task failed");
            }
        }

        let failed = self.correlator.reject_all(BridgeError::ConnectionLost);
        tracing::info!(failed, "Bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_before_start_is_disconnected() {
        let bridge = Bridge::from_config(&BridgeConfig::default()).unwrap();

        let status = bridge.status();
        assert!(!status.connected);
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.pending_requests, 0);
        assert_eq!(status.upstream, "ws://127.0.0.1:9000/");

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "disconnected");
        assert_eq!(json["reconnectAttempts"], 0);
        assert!(json["stats"]["totalConnections"].is_number());
    }

    #[tokio::test]
    async fn submissions_fail_fast_before_start() {
        let mut config = BridgeConfig::default();
        config.retries.enabled = false;
        let bridge = Bridge::from_config(&config).unwrap();

        assert_eq!(
            bridge.submit_idempotent("quote", Value::Null).await,
            Err(BridgeError::NotConnected)
        );
        assert_eq!(bridge.status().stats.total_errors, 1);
    }

    #[test]
    fn rejects_unparseable_upstream_url() {
        let mut config = BridgeConfig::default();
        config.upstream.url = "not a url".into();
        assert!(Bridge::from_config(&config).is_err());
    }
}
