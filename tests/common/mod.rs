//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::accept_async;

use upstream_bridge::config::BridgeConfig;
use upstream_bridge::upstream::ConnectionState;
use upstream_bridge::Bridge;

/// How the mock upstream answers one request.
#[allow(dead_code)]
pub enum Reply {
    Result(Value),
    Error { code: i64, message: String },
    /// Answer with this error object as is.
    Reject(Value),
    /// Never answer.
    Ignore,
    /// Answer with a frame that is not JSON.
    Garbage,
    /// Drop the socket without a close handshake.
    Drop,
    /// Stop reading the socket entirely, so pings go unanswered.
    Stall,
}

/// A programmable upstream WebSocket service.
pub struct MockUpstream {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockUpstream {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(handler);

        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let handler = Arc::clone(&handler);
                tokio::spawn(serve_connection(socket, handler));
            }
        });

        Self { addr, accepted }
    }

    /// Completes the handshake, then never reads the socket again.
    pub async fn deaf() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    if let Ok(ws) = accept_async(socket).await {
                        let _held = ws;
                        std::future::pending::<()>().await;
                    }
                });
            }
        });

        Self { addr, accepted }
    }

    /// Answers every request with its own params as the result.
    pub async fn echo() -> Self {
        Self::start(|_, params| Reply::Result(params.clone())).await
    }

    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Number of accepted TCP connections so far.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

async fn serve_connection<F>(socket: TcpStream, handler: Arc<F>)
where
    F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
{
    let Ok(mut ws) = accept_async(socket).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let request: Value = serde_json::from_str(&text).unwrap();
        let id = request["id"].clone();
        let method = request["method"].as_str().unwrap_or_default().to_string();

        let frame = match handler(&method, &request["params"]) {
            Reply::Result(result) => json!({ "id": id, "result": result }).to_string(),
            Reply::Error { code, message } => {
                json!({ "id": id, "error": { "code": code, "message": message } }).to_string()
            }
            Reply::Reject(error) => json!({ "id": id, "error": error }).to_string(),
            Reply::Ignore => continue,
            Reply::Garbage => "{not json".to_string(),
            Reply::Drop => return,
            Reply::Stall => {
                // Hold the socket open without ever reading it again.
                std::future::pending::<()>().await;
                return;
            }
        };
        if ws.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }
}

/// Config pointing at `upstream` with timings short enough for tests.
#[allow(dead_code)]
pub fn test_config(upstream_url: &str) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.upstream.url = upstream_url.to_string();
    config.upstream.connect_timeout_secs = 2;
    config.requests.timeout_ms = 2_000;
    config.reconnect.interval_ms = 100;
    config.reconnect.max_attempts = 5;
    config.retries.base_delay_ms = 200;
    config.retries.max_delay_ms = 1_000;
    config.heartbeat.interval_secs = 15;
    config.heartbeat.pong_timeout_secs = 7;
    config
}

/// Start a bridge and wait until it is connected.
#[allow(dead_code)]
pub async fn connected_bridge(config: &BridgeConfig) -> Arc<Bridge> {
    let bridge = Arc::new(Bridge::from_config(config).unwrap());
    bridge.start();
    wait_for_state(&bridge, ConnectionState::Connected).await;
    bridge
}

#[allow(dead_code)]
pub async fn wait_for_state(bridge: &Bridge, state: ConnectionState) {
    let mut rx = bridge.manager().subscribe_state();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("bridge never reached {state}"))
        .unwrap();
}

/// Poll `check` until it holds or five seconds pass.
#[allow(dead_code)]
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
