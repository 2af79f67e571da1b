//! Fixtures shared by the relay benchmarks.

use tandem_core::{ConnectionId, Relay};
use tandem_protocol::{codec, ClientFrame, ServerFrame};
use tokio::sync::mpsc;

/// A connection registered with a relay, with its outbound queue.
pub struct BenchClient {
    pub id: ConnectionId,
    pub outbound: mpsc::Receiver<ServerFrame>,
}

impl BenchClient {
    /// Register a new connection.
    pub fn connect(relay: &Relay) -> Self {
        let (id, outbound) = relay.connect();
        Self { id, outbound }
    }

    /// Discard everything queued for this client.
    pub fn drain(&mut self) -> usize {
        let mut n = 0;
        while self.outbound.try_recv().is_ok() {
            n += 1;
        }
        n
    }
}

/// Encoded frame bytes, as they arrive off the wire.
pub fn wire(frame: &ClientFrame) -> Vec<u8> {
    codec::encode_client(frame)
        .map(String::into_bytes)
        .unwrap_or_default()
}

/// Fill `rooms` rooms with a full pair each.
pub fn paired_rooms(relay: &Relay, rooms: usize) -> Vec<(BenchClient, BenchClient)> {
    (0..rooms)
        .map(|i| {
            let join = wire(&ClientFrame::join(format!("room-{i}")));
            let mut a = BenchClient::connect(relay);
            let mut b = BenchClient::connect(relay);
            let _ = relay.handle_frame(a.id, &join);
            let _ = relay.handle_frame(b.id, &join);
            a.drain();
            b.drain();
            (a, b)
        })
        .collect()
}
