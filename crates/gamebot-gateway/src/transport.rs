//! Transport handle and connectors
//!
//! A [`Transport`] is the orchestrator's end of one live connection: a queue of
//! outbound frames, a stream of inbound frames, and a cancellation token that
//! tears both down. Writing never awaits; a full or closed queue is simply a
//! failed write. The WebSocket connector runs a reader and a writer task per
//! connection, [`Transport::pair`] gives an in-memory equivalent.

use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{Envelope, RawFrame};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Outbound queue size per connection
const OUTBOUND_BUFFER_SIZE: usize = 100;

/// Inbound queue size per connection
const INBOUND_BUFFER_SIZE: usize = 256;

/// Why a frame could not be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("transport is closed")]
    Closed,
    #[error("outbound queue is full")]
    Full,
}

/// One live connection, owned by the orchestrator
#[derive(Debug)]
pub struct Transport {
    outbound: mpsc::Sender<RawFrame>,
    inbound: mpsc::Receiver<RawFrame>,
    cancel: CancellationToken,
}

impl Transport {
    /// Wrap the channel ends of a connection
    #[must_use]
    pub fn new(
        outbound: mpsc::Sender<RawFrame>,
        inbound: mpsc::Receiver<RawFrame>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            inbound,
            cancel,
        }
    }

    /// In-memory transport plus the server side of it
    #[must_use]
    pub fn pair(buffer: usize) -> (Self, RemoteEnd) {
        let (to_remote, from_client) = mpsc::channel(buffer);
        let (to_client, from_remote) = mpsc::channel(buffer);
        let cancel = CancellationToken::new();

        let transport = Self::new(to_remote, from_remote, cancel.clone());
        let remote = RemoteEnd {
            incoming: from_client,
            outgoing: to_client,
            cancel,
        };
        (transport, remote)
    }

    /// Check if frames can still be written
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !self.cancel.is_cancelled() && !self.outbound.is_closed()
    }

    /// Queue a frame for writing
    pub fn send(&self, frame: RawFrame) -> Result<(), SendError> {
        if self.cancel.is_cancelled() {
            return Err(SendError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Next inbound frame; `None` once the connection is gone
    ///
    /// Frames already received are handed out before the close is reported.
    pub async fn recv(&mut self) -> Option<RawFrame> {
        tokio::select! {
            biased;
            frame = self.inbound.recv() => frame,
            () = self.cancel.cancelled() => None,
        }
    }

    /// Close the connection
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The far side of an in-memory [`Transport`]
#[derive(Debug)]
pub struct RemoteEnd {
    incoming: mpsc::Receiver<RawFrame>,
    outgoing: mpsc::Sender<RawFrame>,
    cancel: CancellationToken,
}

impl RemoteEnd {
    /// Send a raw frame to the client; `false` if the connection is gone
    pub async fn send_frame(&self, frame: RawFrame) -> bool {
        !self.cancel.is_cancelled() && self.outgoing.send(frame).await.is_ok()
    }

    /// Send an envelope to the client as a text frame
    pub async fn send(&self, envelope: &Envelope) -> bool {
        match envelope.to_json() {
            Ok(json) => self.send_frame(RawFrame::Text(json)).await,
            Err(_) => false,
        }
    }

    /// Next frame written by the client
    pub async fn recv_frame(&mut self) -> Option<RawFrame> {
        tokio::select! {
            biased;
            frame = self.incoming.recv() => frame,
            () = self.cancel.cancelled() => None,
        }
    }

    /// Next envelope written by the client, skipping undecodable frames
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            let frame = self.recv_frame().await?;
            if let RawFrame::Text(text) = frame {
                if let Ok(envelope) = Envelope::from_json(&text) {
                    return Some(envelope);
                }
            }
        }
    }

    /// Close the connection from the server side
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Check if either side closed the connection
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `url`
    async fn connect(&self, url: &Url) -> GatewayResult<Transport>;
}

/// Connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> GatewayResult<Transport> {
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| GatewayError::TransportUnavailable(e.to_string()))?;

        tracing::debug!(host = url.host_str().unwrap_or_default(), "WebSocket connected");

        let (mut ws_sink, mut ws_stream) = stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<RawFrame>(OUTBOUND_BUFFER_SIZE);
        let (in_tx, in_rx) = mpsc::channel::<RawFrame>(INBOUND_BUFFER_SIZE);
        let cancel = CancellationToken::new();

        // Writer: drains the outbound queue, sends a close frame on cancel
        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = writer_cancel.cancelled() => {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                    frame = out_rx.recv() => {
                        let Some(frame) = frame else { break };
                        let message = match frame {
                            RawFrame::Text(text) => Message::Text(text),
                            RawFrame::Binary(bytes) => Message::Binary(bytes),
                        };
                        if let Err(e) = ws_sink.send(message).await {
                            tracing::warn!(error = %e, "Failed to write to WebSocket");
                            writer_cancel.cancel();
                            break;
                        }
                    }
                }
            }
            let _ = ws_sink.close().await;
            tracing::trace!("WebSocket writer stopped");
        });

        // Reader: forwards data frames, any close or error ends the connection
        let reader_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    () = reader_cancel.cancelled() => break,
                    message = ws_stream.next() => message,
                };

                let frame = match message {
                    Some(Ok(Message::Text(text))) => RawFrame::Text(text),
                    Some(Ok(Message::Binary(bytes))) => RawFrame::Binary(bytes),
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                    Some(Ok(Message::Close(close))) => {
                        tracing::info!(close = ?close, "Server closed WebSocket");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket read error");
                        break;
                    }
                    None => break,
                };

                if in_tx.send(frame).await.is_err() {
                    break;
                }
            }
            reader_cancel.cancel();
            tracing::trace!("WebSocket reader stopped");
        });

        Ok(Transport::new(out_tx, in_rx, cancel))
    }
}
