//! Transport abstraction traits for Tandem.
//!
//! A [`Connection`] splits into a [`FrameSink`] owned by the writer task and
//! a [`FrameStream`] owned by the receive loop, so reading and writing never
//! contend for the same handle.

use async_trait::async_trait;
use bytes::Bytes;
use tandem_protocol::{codec, ServerFrame};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] tandem_protocol::ProtocolError),
}

/// Something read from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// An application frame (text or binary message body).
    Frame(Bytes),
    /// Keepalive traffic (ping or pong). Only proves the peer is alive.
    Heartbeat,
}

/// Receiving half of a connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Receive the next inbound item.
    ///
    /// Returns `None` if the connection is closed cleanly.
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError>;
}

/// Sending half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send a text message.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a keepalive ping.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Encode and send a server frame.
    async fn send_frame(&mut self, frame: &ServerFrame) -> Result<(), TransportError> {
        let text = codec::encode(frame)?;
        self.send_text(text).await
    }
}

/// An accepted connection to one client.
pub trait Connection: Send + 'static {
    /// Sending half.
    type Sink: FrameSink + 'static;
    /// Receiving half.
    type Stream: FrameStream + 'static;

    /// Split into independently owned halves.
    fn split(self) -> (Self::Sink, Self::Stream);

    /// Remote address of the connection, if available.
    fn remote_addr(&self) -> Option<String> {
        None
    }
}
