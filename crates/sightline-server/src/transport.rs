//! Transport boundary: the bidirectional message channel a session runs on.
//!
//! Sessions only see [`FrameTransport`]; the WebSocket binding lives in
//! [`WsTransport`] and an in-process channel pair in [`memory`].

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use sightline_core::TransportError;
use tracing::debug;

/// One client-sent unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Base64 image text, optionally with a data-URL prefix.
    Text(String),
    /// Raw encoded image bytes.
    Binary(Vec<u8>),
}

impl Payload {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(t) => t.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one receive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A client message.
    Message(Payload),
    /// The peer closed the channel.
    EndOfStream,
}

/// Bidirectional message channel for one session.
///
/// `receive` must be cancel-safe: pull-mode sessions race it against their
/// pacing timer.
#[async_trait]
pub trait FrameTransport: Send {
    /// Wait for the next client message or end-of-stream.
    async fn receive(&mut self) -> Result<Inbound, TransportError>;

    /// Write one JSON response.
    async fn send(&mut self, message: String) -> Result<(), TransportError>;

    /// Close the channel. Idempotent.
    async fn close(&mut self);
}

/// [`FrameTransport`] over an upgraded axum WebSocket.
pub struct WsTransport {
    socket: WebSocket,
    closed: bool,
}

impl WsTransport {
    /// Wrap an upgraded socket. The handshake has already succeeded.
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn receive(&mut self) -> Result<Inbound, TransportError> {
        if self.closed {
            return Ok(Inbound::EndOfStream);
        }
        loop {
            match self.socket.recv().await {
                None | Some(Ok(Message::Close(_))) => return Ok(Inbound::EndOfStream),
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Inbound::Message(Payload::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Inbound::Message(Payload::Binary(bytes.to_vec())));
                }
                // axum answers pings itself
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            }
        }
    }

    async fn send(&mut self, message: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.socket
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // the peer may already be gone
        if let Err(e) = self.socket.send(Message::Close(None)).await {
            debug!(error = %e, "close frame not delivered");
        }
    }
}

/// In-process transport pair for driving sessions without a network.
pub mod memory {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use sightline_core::TransportError;
    use tokio::sync::mpsc;

    use super::{FrameTransport, Inbound, Payload};

    #[derive(Default)]
    struct Shared {
        closed: AtomicBool,
        close_calls: AtomicUsize,
        fail_sends: AtomicBool,
    }

    /// Server half: what the session owns.
    pub struct ChannelTransport {
        inbound: mpsc::Receiver<Payload>,
        outbound: mpsc::UnboundedSender<String>,
        shared: Arc<Shared>,
    }

    /// Client half: what a test drives.
    pub struct ChannelPeer {
        inbound: Option<mpsc::Sender<Payload>>,
        outbound: mpsc::UnboundedReceiver<String>,
        shared: Arc<Shared>,
    }

    /// Create a connected pair. `capacity` bounds client messages in flight,
    /// which is where backpressure shows up.
    pub fn pair(capacity: usize) -> (ChannelTransport, ChannelPeer) {
        let (in_tx, in_rx) = mpsc::channel(capacity.max(1));
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        (
            ChannelTransport {
                inbound: in_rx,
                outbound: out_tx,
                shared: Arc::clone(&shared),
            },
            ChannelPeer {
                inbound: Some(in_tx),
                outbound: out_rx,
                shared,
            },
        )
    }

    #[async_trait]
    impl FrameTransport for ChannelTransport {
        async fn receive(&mut self) -> Result<Inbound, TransportError> {
            if self.shared.closed.load(Ordering::Acquire) {
                return Ok(Inbound::EndOfStream);
            }
            Ok(match self.inbound.recv().await {
                Some(payload) => Inbound::Message(payload),
                None => Inbound::EndOfStream,
            })
        }

        async fn send(&mut self, message: String) -> Result<(), TransportError> {
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(TransportError::Closed);
            }
            if self.shared.fail_sends.load(Ordering::Acquire) {
                return Err(TransportError::Send("peer write failed".into()));
            }
            self.outbound
                .send(message)
                .map_err(|_| TransportError::Closed)
        }

        async fn close(&mut self) {
            let _ = self.shared.close_calls.fetch_add(1, Ordering::AcqRel);
            if !self.shared.closed.swap(true, Ordering::AcqRel) {
                self.inbound.close();
            }
        }
    }

    impl ChannelPeer {
        /// Send a text payload. Returns `false` once the server side is gone.
        pub async fn send_text(&self, text: impl Into<String>) -> bool {
            self.send(Payload::Text(text.into())).await
        }

        /// Send a binary payload. Returns `false` once the server side is gone.
        pub async fn send_binary(&self, bytes: Vec<u8>) -> bool {
            self.send(Payload::Binary(bytes)).await
        }

        async fn send(&self, payload: Payload) -> bool {
            match &self.inbound {
                Some(tx) => tx.send(payload).await.is_ok(),
                None => false,
            }
        }

        /// End the stream from the client side.
        pub fn hang_up(&mut self) {
            self.inbound = None;
        }

        /// Make every later server write fail.
        pub fn fail_writes(&self) {
            self.shared.fail_sends.store(true, Ordering::Release);
        }

        /// Next server response; `None` once the server side is dropped.
        pub async fn recv(&mut self) -> Option<String> {
            self.outbound.recv().await
        }

        /// A response that is already waiting, if any.
        pub fn try_recv(&mut self) -> Option<String> {
            self.outbound.try_recv().ok()
        }

        /// Whether the server side has closed the channel.
        pub fn is_closed(&self) -> bool {
            self.shared.closed.load(Ordering::Acquire)
        }

        /// How many times `close` was called on the server side.
        pub fn close_calls(&self) -> usize {
            self.shared.close_calls.load(Ordering::Acquire)
        }
    }
}
