//! In-process transport.
//!
//! [`MemoryConnection::pair`] returns a connection for the server side and a
//! [`MemoryPeer`] that plays the client. Used to drive the connection loop
//! in tests without opening sockets.

use async_trait::async_trait;
use bytes::Bytes;
use tandem_protocol::{codec, ClientFrame, ServerFrame};
use tokio::sync::mpsc;

use crate::traits::{Connection, FrameSink, FrameStream, Inbound, TransportError};

/// What the server side wrote to a [`MemoryPeer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// A text message.
    Text(String),
    /// A keepalive ping.
    Ping,
    /// A close frame; nothing follows it.
    Close,
}

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::UnboundedSender<Outgoing>,
}

/// Client side of an in-memory connection.
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    outbound: mpsc::UnboundedReceiver<Outgoing>,
}

impl MemoryConnection {
    /// Create a connected pair.
    #[must_use]
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            MemoryConnection {
                inbound: in_rx,
                outbound: out_tx,
            },
            MemoryPeer {
                inbound: Some(in_tx),
                outbound: out_rx,
            },
        )
    }
}

impl Connection for MemoryConnection {
    type Sink = MemoryWriter;
    type Stream = MemoryReader;

    fn split(self) -> (Self::Sink, Self::Stream) {
        (
            MemoryWriter {
                outbound: self.outbound,
            },
            MemoryReader {
                inbound: self.inbound,
            },
        )
    }

    fn remote_addr(&self) -> Option<String> {
        Some("memory".to_string())
    }
}

/// Sending half of a [`MemoryConnection`].
pub struct MemoryWriter {
    outbound: mpsc::UnboundedSender<Outgoing>,
}

#[async_trait]
impl FrameSink for MemoryWriter {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(Outgoing::Text(text))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.outbound
            .send(Outgoing::Ping)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Closing twice, or after the peer dropped, is fine.
        let _ = self.outbound.send(Outgoing::Close);
        Ok(())
    }
}

/// Receiving half of a [`MemoryConnection`].
pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl FrameStream for MemoryReader {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        Ok(self.inbound.recv().await)
    }
}

impl MemoryPeer {
    /// Send raw frame bytes, as a client would.
    pub fn send_raw(&self, data: impl Into<Bytes>) -> Result<(), TransportError> {
        self.push(Inbound::Frame(data.into()))
    }

    /// Encode and send a client frame.
    pub fn send(&self, frame: &ClientFrame) -> Result<(), TransportError> {
        let text = codec::encode_client(frame)?;
        self.send_raw(text)
    }

    /// Send keepalive traffic.
    pub fn heartbeat(&self) -> Result<(), TransportError> {
        self.push(Inbound::Heartbeat)
    }

    /// Hang up. The server side sees end of stream.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Next thing the server wrote, or `None` once the server side is gone.
    pub async fn recv(&mut self) -> Option<Outgoing> {
        self.outbound.recv().await
    }

    /// Next decoded server frame, skipping pings.
    ///
    /// Returns `None` on close or when the server side is gone.
    pub async fn recv_frame(&mut self) -> Option<ServerFrame> {
        loop {
            match self.outbound.recv().await? {
                Outgoing::Text(text) => return codec::decode_server(&text).ok(),
                Outgoing::Ping => continue,
                Outgoing::Close => return None,
            }
        }
    }

    fn push(&self, item: Inbound) -> Result<(), TransportError> {
        self.inbound
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?
            .send(item)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (conn, mut peer) = MemoryConnection::pair();
        let (mut sink, mut stream) = conn.split();

        peer.send(&ClientFrame::join("alpha")).unwrap();
        let Some(Inbound::Frame(data)) = stream.recv().await.unwrap() else {
            panic!("expected a frame");
        };
        assert!(std::str::from_utf8(&data).unwrap().contains("\"roomId\":\"alpha\""));

        sink.send_frame(&ServerFrame::chat("hi")).await.unwrap();
        assert_eq!(peer.recv_frame().await, Some(ServerFrame::chat("hi")));
    }

    #[tokio::test]
    async fn test_ping_is_skipped_by_recv_frame() {
        let (conn, mut peer) = MemoryConnection::pair();
        let (mut sink, _stream) = conn.split();

        sink.ping().await.unwrap();
        sink.send_frame(&ServerFrame::chat("after ping")).await.unwrap();
        assert_eq!(peer.recv_frame().await, Some(ServerFrame::chat("after ping")));
    }

    #[tokio::test]
    async fn test_hang_up_ends_stream() {
        let (conn, mut peer) = MemoryConnection::pair();
        let (_sink, mut stream) = conn.split();

        peer.heartbeat().unwrap();
        peer.hang_up();

        assert_eq!(stream.recv().await.unwrap(), Some(Inbound::Heartbeat));
        assert_eq!(stream.recv().await.unwrap(), None);
        assert!(peer.send_raw("late").is_err());
    }

    #[tokio::test]
    async fn test_server_drop_ends_peer() {
        let (conn, mut peer) = MemoryConnection::pair();
        drop(conn);
        assert_eq!(peer.recv().await, None);
    }
}
