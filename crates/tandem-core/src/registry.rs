//! Connection registry.
//!
//! Holds every live connection, its session state and the sending half of
//! its bounded outbound queue. The session doubles as the connection's room
//! assignment, so finding a sender's room is a single map lookup.

use crate::directory::RoomId;
use crate::session::SessionState;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tandem_protocol::ServerFrame;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

/// Sending half of a connection's outbound queue.
pub type Outbound = mpsc::Sender<ServerFrame>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next identity.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value. Identities built this way are not registered.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct ConnectionEntry {
    outbound: Outbound,
    session: SessionState,
}

/// Registry of live connections.
#[derive(Default)]
pub struct Registry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted connection in the `Unjoined` state.
    pub fn register(&self, outbound: Outbound) -> ConnectionId {
        let id = ConnectionId::next();
        self.connections.insert(
            id,
            ConnectionEntry {
                outbound,
                session: SessionState::Unjoined,
            },
        );
        debug!(connection = %id, "Registered connection");
        id
    }

    /// Current session state, or `None` if the connection is unknown.
    #[must_use]
    pub fn session(&self, id: ConnectionId) -> Option<SessionState> {
        self.connections.get(&id).map(|e| e.session.clone())
    }

    /// Replace a connection's session state.
    ///
    /// Returns `false` if the connection is unknown.
    pub fn set_session(&self, id: ConnectionId, session: SessionState) -> bool {
        match self.connections.get_mut(&id) {
            Some(mut entry) => {
                trace!(connection = %id, from = ?entry.session, to = ?session, "Session transition");
                entry.session = session;
                true
            }
            None => false,
        }
    }

    /// Move a connection from `Joined(room_id)` back to `Unjoined`.
    ///
    /// Does nothing, and returns `false`, if the connection has meanwhile
    /// left, closed or moved to another room.
    pub fn release(&self, id: ConnectionId, room_id: &str) -> bool {
        let Some(mut entry) = self.connections.get_mut(&id) else {
            return false;
        };
        if entry.session.room() != Some(room_id) {
            return false;
        }
        trace!(connection = %id, room = %room_id, "Released from closed room");
        entry.session = SessionState::Unjoined;
        true
    }

    /// The room a connection is currently in.
    #[must_use]
    pub fn lookup_room(&self, id: ConnectionId) -> Option<RoomId> {
        self.connections
            .get(&id)
            .and_then(|e| e.session.room().map(str::to_string))
    }

    /// Connections whose session is joined to `room_id`, in ascending order.
    ///
    /// This scans every connection; the router reads membership from the
    /// room directory instead.
    #[must_use]
    pub fn members_of(&self, room_id: &str) -> Vec<ConnectionId> {
        let mut members: Vec<_> = self
            .connections
            .iter()
            .filter(|e| e.session.room() == Some(room_id))
            .map(|e| *e.key())
            .collect();
        members.sort_unstable();
        members
    }

    /// Queue a frame for a connection without waiting.
    ///
    /// Returns `false` if the frame was dropped because the connection is
    /// unknown, its queue is full, or its writer has gone away.
    pub fn deliver(&self, id: ConnectionId, frame: ServerFrame) -> bool {
        let Some(entry) = self.connections.get(&id) else {
            trace!(connection = %id, "Dropping frame for unknown connection");
            return false;
        };

        match entry.outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection = %id, "Outbound queue full, dropping frame");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection = %id, "Outbound queue closed, dropping frame");
                false
            }
        }
    }

    /// Remove a connection. Idempotent.
    ///
    /// Returns the session the connection was in, if it was registered.
    pub fn remove(&self, id: ConnectionId) -> Option<SessionState> {
        let removed = self.connections.remove(&id).map(|(_, e)| e.session);
        if removed.is_some() {
            debug!(connection = %id, "Removed connection");
        }
        removed
    }

    /// Check if a connection is registered.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if there are no live connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert!(a.to_string().starts_with("conn-"));
    }

    #[test]
    fn test_register_starts_unjoined() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.register(tx);

        assert!(registry.contains(id));
        assert_eq!(registry.session(id), Some(SessionState::Unjoined));
        assert_eq!(registry.lookup_room(id), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_and_members() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::channel(4);
        let a = registry.register(tx.clone());
        let b = registry.register(tx.clone());
        let c = registry.register(tx);

        registry.set_session(a, SessionState::Joined("alpha".to_string()));
        registry.set_session(b, SessionState::Joined("alpha".to_string()));
        registry.set_session(c, SessionState::Joined("beta".to_string()));

        assert_eq!(registry.lookup_room(a).as_deref(), Some("alpha"));
        assert_eq!(registry.members_of("alpha"), vec![a, b]);
        assert_eq!(registry.members_of("beta"), vec![c]);
        assert!(registry.members_of("gamma").is_empty());
    }

    #[test]
    fn test_release_only_from_named_room() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::channel(4);
        let a = registry.register(tx.clone());
        let b = registry.register(tx);

        registry.set_session(a, SessionState::Joined("alpha".to_string()));
        registry.set_session(b, SessionState::Joined("gamma".to_string()));

        assert!(registry.release(a, "alpha"));
        assert_eq!(registry.session(a), Some(SessionState::Unjoined));
        assert!(!registry.release(a, "alpha"));

        // Already moved on to another room: left alone.
        assert!(!registry.release(b, "alpha"));
        assert_eq!(registry.session(b), Some(SessionState::Joined("gamma".to_string())));

        registry.set_session(b, SessionState::Closed);
        assert!(!registry.release(b, "gamma"));
        assert!(!registry.release(ConnectionId::from_raw(u64::MAX), "alpha"));
    }

    #[tokio::test]
    async fn test_deliver() {
        let registry = Registry::new();
        let (tx, mut rx) = mpsc::channel(4);
        let id = registry.register(tx);

        assert!(registry.deliver(id, ServerFrame::chat("hi")));
        assert_eq!(rx.recv().await, Some(ServerFrame::chat("hi")));
    }

    #[test]
    fn test_deliver_drops_when_full_or_closed() {
        let registry = Registry::new();
        let (tx, rx) = mpsc::channel(1);
        let id = registry.register(tx);

        assert!(registry.deliver(id, ServerFrame::chat("one")));
        assert!(!registry.deliver(id, ServerFrame::chat("two")));

        drop(rx);
        assert!(!registry.deliver(id, ServerFrame::chat("three")));
        assert!(!registry.deliver(ConnectionId::from_raw(u64::MAX), ServerFrame::chat("x")));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.register(tx);
        registry.set_session(id, SessionState::Joined("alpha".to_string()));

        assert_eq!(
            registry.remove(id),
            Some(SessionState::Joined("alpha".to_string()))
        );
        assert_eq!(registry.remove(id), None);
        assert!(!registry.set_session(id, SessionState::Unjoined));
        assert!(registry.is_empty());
    }
}
