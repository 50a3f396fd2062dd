//! Transport abstraction consumed by the connection manager.
//!
//! A successful [`Transport::open`] is the open event. After that the
//! connection reports through its event channel and is driven through its
//! [`TransportHandle`]. When every handle is dropped the connection is torn
//! down.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Notify};
use url::Url;

/// Errors raised by a transport.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out")]
    ConnectTimeout,

    #[error("send failed: {0}")]
    Send(String),

    #[error("connection closed")]
    Closed,
}

/// Events reported by an open connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A data frame.
    Message(Vec<u8>),
    /// Reply to a ping.
    Pong,
    /// The connection ended. Always the last event.
    Closed { code: u16, reason: String },
    /// The connection failed; a `Closed` event follows.
    Error(String),
}

/// Commands consumed by a transport's writer.
#[derive(Debug)]
pub enum Outbound {
    /// Write a frame and report the write's outcome.
    Frame(String, oneshot::Sender<Result<(), TransportError>>),
    Ping,
    /// Graceful close handshake.
    Close,
    /// Drop the connection immediately.
    Terminate,
}

/// Create the command channel between handles and a transport's writer.
pub fn outbound_channel(buffer: usize) -> (TransportHandle, OutboundQueue) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let kill = Arc::new(Notify::new());
    (
        TransportHandle {
            tx,
            kill: Arc::clone(&kill),
        },
        OutboundQueue { rx, kill },
    )
}

/// Writer side of [`outbound_channel`].
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<Outbound>,
    kill: Arc<Notify>,
}

impl OutboundQueue {
    /// Next command for the writer. A terminate request jumps the queue.
    /// `None` once every handle is gone.
    pub async fn recv(&mut self) -> Option<Outbound> {
        tokio::select! {
            biased;
            _ = self.kill.notified() => Some(Outbound::Terminate),
            cmd = self.rx.recv() => cmd,
        }
    }

    /// Resolves on a terminate request. Race every write against this so a
    /// write stuck on a peer that stopped reading cannot outlive the
    /// connection.
    pub async fn killed(&self) {
        self.kill.notified().await;
    }
}

/// Cloneable write side of an open connection.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    tx: mpsc::Sender<Outbound>,
    kill: Arc<Notify>,
}

impl TransportHandle {
    /// Write one frame. Resolves once the transport has accepted or refused it.
    pub async fn send(&self, frame: String) -> Result<(), TransportError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Outbound::Frame(frame, ack_tx))
            .await
            .map_err(|_| TransportError::Closed)?;
        ack_rx.await.map_err(|_| TransportError::Closed)?
    }

    /// Queue a ping without waiting. A full queue skips this ping; the pong
    /// deadline still runs, so a writer that cannot drain expires the
    /// connection.
    pub fn ping(&self) -> Result<(), TransportError> {
        match self.tx.try_send(Outbound::Ping) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Outbound queue full, skipping ping");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    /// Start a graceful close without waiting. Falls back to terminating
    /// when the queue is full.
    pub fn close(&self) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(Outbound::Close) {
            tracing::debug!("Outbound queue full, terminating instead of closing");
            self.terminate();
        }
    }

    /// Forced, non-graceful teardown, ahead of any queued frames.
    pub fn terminate(&self) {
        self.kill.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// An open connection: its write handle plus its event stream.
#[derive(Debug)]
pub struct Connection {
    pub handle: TransportHandle,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Something that can open connections to the upstream.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &Url) -> impl Future<Output = Result<Connection, TransportError>> + Send;
}
