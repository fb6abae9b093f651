//! tokio-tungstenite transport driver.
//!
//! [`WsTransport`] implements the engine's [`Transport`] seam; [`connect`]
//! opens the websocket, attaches the transport, and spawns the writer and
//! reader tasks. The transport outlives individual connections so the same
//! [`Client`] keeps its handlers across reconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use strand_client::{Client, ClientError, Transport};

/// Errors surfaced by the websocket layer.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    /// The websocket handshake with the server failed.
    #[error("websocket connect failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
}

struct Conn {
    outbound: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
    generation: u64,
}

/// Transport backed by a live websocket, or by nothing between connections.
#[derive(Default)]
pub struct WsTransport {
    conn: Mutex<Option<Conn>>,
    generation: AtomicU64,
}

impl WsTransport {
    /// Transport with no connection attached yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new connection, cancelling any previous one. Returns the
    /// generation tag the new connection's reader must present to detach.
    fn attach(&self, outbound: mpsc::UnboundedSender<String>, shutdown: CancellationToken) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self.conn.lock().replace(Conn {
            outbound,
            shutdown,
            generation,
        });
        if let Some(previous) = previous {
            previous.shutdown.cancel();
        }
        generation
    }

    /// Clear the attached connection only if it still is `generation`.
    ///
    /// A reader whose connection was replaced by a newer `attach` gets
    /// `false` and must not touch the engine: the replacement is live.
    fn detach_if(&self, generation: u64) -> bool {
        let mut conn = self.conn.lock();
        match conn.as_ref() {
            Some(current) if current.generation == generation => {
                *conn = None;
                true
            }
            _ => false,
        }
    }
}

impl Transport for WsTransport {
    fn send_text(&self, text: &str) -> Result<(), ClientError> {
        let conn = self.conn.lock();
        let Some(conn) = conn.as_ref() else {
            return Err(ClientError::NotConnected);
        };
        conn.outbound
            .send(text.to_owned())
            .map_err(|_| ClientError::NotConnected)
    }

    fn close(&self) -> Result<(), ClientError> {
        if let Some(conn) = self.conn.lock().as_ref() {
            conn.shutdown.cancel();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }
}

/// Handle on one connection's lifetime.
#[derive(Clone)]
pub struct ConnectionHandle {
    shutdown: CancellationToken,
}

impl ConnectionHandle {
    /// Tear the connection down. The engine's disconnect listener fires once
    /// the reader task observes the cancellation.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Resolves when the connection has ended, for any reason.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    /// Whether the connection has already ended.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Open a websocket to `url` and drive `client` with it.
///
/// On success the engine has already been handed the connected edge (so the
/// handshake is on the wire) and two tasks own the socket: a writer draining
/// the outbound channel and a reader feeding inbound frames to the engine.
/// On failure the engine's connect-error listener has fired.
pub async fn connect(
    url: &str,
    client: &Client,
    transport: &Arc<WsTransport>,
) -> Result<ConnectionHandle, WsError> {
    let (stream, _response) = match connect_async(url).await {
        Ok(ok) => ok,
        Err(error) => {
            client.handle_connect_error(ClientError::Send(error.to_string()));
            return Err(WsError::Connect(error));
        }
    };
    debug!(url, "websocket open");

    let (mut sink, mut source) = stream.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let shutdown = CancellationToken::new();

    let generation = transport.attach(outbound, shutdown.clone());
    client.handle_connected();

    let writer_shutdown = shutdown.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = writer_shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.flush().await;
                    break;
                }
                frame = outbound_rx.recv() => match frame {
                    Some(text) => {
                        if let Err(error) = sink.send(Message::text(text)).await {
                            warn!(error = %error, "websocket send failed");
                            writer_shutdown.cancel();
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    let reader_client = client.clone();
    let reader_transport = Arc::clone(transport);
    let reader_shutdown = shutdown.clone();
    drop(tokio::spawn(async move {
        let error = loop {
            tokio::select! {
                () = reader_shutdown.cancelled() => break None,
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => reader_client.handle_text(text.as_str()),
                    // Control pings are answered by tungstenite itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "websocket closed by peer");
                        break None;
                    }
                    Some(Ok(other)) => {
                        warn!(kind = ?other, "ignoring non-text frame");
                    }
                    Some(Err(error)) => break Some(ClientError::Send(error.to_string())),
                    None => break None,
                },
            }
        };
        reader_shutdown.cancel();
        let _ = writer.await;
        // A newer connection may already be attached; only the connection's
        // own reader reports the disconnect.
        if reader_transport.detach_if(generation) {
            reader_client.handle_disconnected(error);
        }
    }));

    Ok(ConnectionHandle { shutdown })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_transport_rejects_sends() {
        let transport = WsTransport::new();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send_text("x"),
            Err(ClientError::NotConnected)
        ));
        transport.close().unwrap();
    }

    #[test]
    fn attach_replaces_previous_connection() {
        let transport = WsTransport::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let first = CancellationToken::new();
        let _ = transport.attach(tx1, first.clone());

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let _ = transport.attach(tx2, CancellationToken::new());
        assert!(first.is_cancelled());

        transport.send_text("hello").unwrap();
        assert_eq!(rx2.try_recv().unwrap(), "hello");
    }

    #[test]
    fn stale_reader_cannot_detach_replacement() {
        let transport = WsTransport::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let first = transport.attach(tx1, CancellationToken::new());
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let second = transport.attach(tx2, CancellationToken::new());

        // The replaced connection's reader must leave the new one alone.
        assert!(!transport.detach_if(first));
        assert!(transport.is_connected());

        assert!(transport.detach_if(second));
        assert!(!transport.is_connected());
        assert!(!transport.detach_if(second));
    }

    #[test]
    fn close_cancels_without_detaching() {
        let transport = WsTransport::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let _ = transport.attach(tx, shutdown.clone());

        transport.close().unwrap();
        assert!(shutdown.is_cancelled());
        // detach is the reader task's job once the socket is really gone
        assert!(transport.is_connected());
    }
}
