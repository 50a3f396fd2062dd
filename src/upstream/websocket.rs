//! WebSocket transport over `tokio-tungstenite`.
//!
//! # Data Flow
//! ```text
//! TransportHandle ──Outbound──▶ writer task ──frames──▶ upstream
//! upstream ──frames──▶ reader task ──TransportEvent──▶ connection manager
//! ```
//!
//! The writer owns the connection's lifetime: when it stops (close,
//! terminate, write error, or every handle dropped) it aborts the reader,
//! which releases the socket. Terminate interrupts a write in progress, so a
//! peer that stops reading cannot pin the socket.

use std::future::Future;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::config::UpstreamConfig;
use crate::upstream::transport::{
    outbound_channel, Connection, Outbound, OutboundQueue, Transport, TransportError,
    TransportEvent,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the socket ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported when a close frame carries no status.
const NO_STATUS: u16 = 1005;
/// Upper bound on the close handshake before the socket is dropped anyway.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens WebSocket connections to the upstream.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
    buffer: usize,
}

impl WsTransport {
    pub fn new(connect_timeout: Duration, buffer: usize) -> Self {
        Self {
            connect_timeout,
            buffer,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(config.connect_timeout(), config.outbound_buffer)
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &Url) -> impl Future<Output = Result<Connection, TransportError>> + Send {
        let url = url.clone();
        let connect_timeout = self.connect_timeout;
        let buffer = self.buffer;

        async move {
            let (ws, _response) = tokio::time::timeout(connect_timeout, connect_async(url.as_str()))
                .await
                .map_err(|_| TransportError::ConnectTimeout)?
                .map_err(|e| TransportError::Connect(e.to_string()))?;

            let (sink, stream) = ws.split();
            let (events_tx, events_rx) = mpsc::channel(buffer.max(1));
            let (handle, queue) = outbound_channel(buffer);

            let reader = tokio::spawn(read_loop(stream, events_tx)).abort_handle();
            tokio::spawn(write_loop(sink, queue, reader));

            Ok(Connection {
                handle,
                events: events_rx,
            })
        }
    }
}

async fn write_loop<S>(mut sink: S, mut queue: OutboundQueue, reader: AbortHandle)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(cmd) = queue.recv().await {
        let message = match cmd {
            Outbound::Frame(text, ack) => {
                let result = tokio::select! {
                    biased;
                    _ = queue.killed() => break,
                    sent = sink.send(Message::Text(text.into())) => {
                        sent.map_err(|e| TransportError::Send(e.to_string()))
                    }
                };
                let failed = result.is_err();
                let _ = ack.send(result);
                if failed {
                    break;
                }
                continue;
            }
            Outbound::Ping => Message::Ping(Vec::<u8>::new().into()),
            Outbound::Close => {
                let close = async {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        tracing::debug!(error = %e, "Close frame not delivered");
                    }
                    let _ = sink.close().await;
                };
                tokio::select! {
                    biased;
                    _ = queue.killed() => {}
                    _ = tokio::time::timeout(CLOSE_TIMEOUT, close) => {}
                }
                break;
            }
            Outbound::Terminate => {
                tracing::debug!("Terminating upstream socket");
                break;
            }
        };

        let sent = tokio::select! {
            biased;
            _ = queue.killed() => break,
            sent = sink.send(message) => sent,
        };
        if let Err(e) = sent {
            tracing::warn!(error = %e, "Failed to send ping");
            break;
        }
    }
    reader.abort();
}

async fn read_loop(mut stream: SplitStream<WsStream>, events: mpsc::Sender<TransportEvent>) {
    while let Some(message) = stream.next().await {
        let event = match message {
            Ok(Message::Text(text)) => TransportEvent::Message(text.as_bytes().to_vec()),
            Ok(Message::Binary(data)) => TransportEvent::Message(data.to_vec()),
            Ok(Message::Pong(_)) => TransportEvent::Pong,
            // tungstenite answers pings on its own.
            Ok(Message::Ping(_)) | Ok(Message::Frame(_)) => continue,
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.to_string()))
                    .unwrap_or((NO_STATUS, String::new()));
                let _ = events.send(TransportEvent::Closed { code, reason }).await;
                return;
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                break;
            }
        };
        if events.send(event).await.is_err() {
            return;
        }
    }

    let _ = events
        .send(TransportEvent::Closed {
            code: ABNORMAL_CLOSURE,
            reason: "connection dropped".to_string(),
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio_tungstenite::tungstenite;

    /// A socket whose peer never reads: nothing is ever accepted.
    struct BlockedSink;

    impl Sink<Message> for BlockedSink {
        type Error = tungstenite::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    fn spawn_writer() -> (
        crate::upstream::transport::TransportHandle,
        tokio::task::JoinHandle<()>,
        tokio::task::JoinHandle<()>,
    ) {
        let (handle, queue) = outbound_channel(4);
        let reader = tokio::spawn(std::future::pending::<()>());
        let writer = tokio::spawn(write_loop(BlockedSink, queue, reader.abort_handle()));
        (handle, writer, reader)
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_interrupts_a_stuck_write() {
        let (handle, writer, reader) = spawn_writer();

        let send = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.send("{\"id\":1}".into()).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!writer.is_finished());

        handle.terminate();

        writer.await.unwrap();
        assert!(reader.await.unwrap_err().is_cancelled());
        assert_eq!(send.await.unwrap(), Err(TransportError::Closed));
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn close_handshake_is_bounded() {
        let (handle, writer, reader) = spawn_writer();
        let start = tokio::time::Instant::now();

        handle.close();

        writer.await.unwrap();
        assert_eq!(start.elapsed(), CLOSE_TIMEOUT);
        assert!(reader.await.unwrap_err().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn ping_and_close_never_block_on_a_full_queue() {
        let (handle, writer, _reader) = spawn_writer();

        // One frame occupies the writer, four more fill the queue.
        for n in 0..5 {
            let handle = handle.clone();
            tokio::spawn(async move { handle.send(format!("{{\"id\":{n}}}")).await });
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(handle.ping(), Ok(()));
        handle.close();

        writer.await.unwrap();
    }
}
