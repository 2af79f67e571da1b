//! The relay: registry, room directory and router behind one handle.
//!
//! Every method is synchronous and non-blocking. A connection's commands must
//! be fed in arrival order from a single task; different connections may call
//! in concurrently.

use crate::directory::RoomDirectory;
use crate::error::RelayError;
use crate::registry::{ConnectionId, Registry};
use crate::router::Router;
use crate::session::{SessionEvent, SessionState, Step};
use std::sync::Arc;
use tandem_protocol::{codec, ClientFrame, Decoded, ServerFrame, SystemAction};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default outbound queue length per connection.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Notice sent to the members left behind when someone departs.
pub const PEER_LEFT_MESSAGE: &str = "Your chat partner has left the room";

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Outbound queue length per connection.
    pub outbound_buffer: usize,
    /// Members per room.
    pub room_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            room_capacity: crate::directory::ROOM_CAPACITY,
        }
    }
}

/// Relay statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Live connections.
    pub connections: usize,
    /// Rooms with at least one member.
    pub rooms: usize,
    /// Connections currently in a room.
    pub joined: usize,
}

/// The chat relay.
pub struct Relay {
    registry: Arc<Registry>,
    directory: Arc<RoomDirectory>,
    router: Router,
    config: RelayConfig,
}

impl Relay {
    /// Create a relay with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Create a relay with custom configuration.
    #[must_use]
    pub fn with_config(config: RelayConfig) -> Self {
        info!("Creating relay with config: {:?}", config);
        let registry = Arc::new(Registry::new());
        let directory = Arc::new(RoomDirectory::with_capacity(config.room_capacity));
        let router = Router::new(Arc::clone(&registry), Arc::clone(&directory));
        Self {
            registry,
            directory,
            router,
            config,
        }
    }

    /// The connection registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The room directory.
    #[must_use]
    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            connections: self.registry.len(),
            rooms: self.directory.len(),
            joined: self.directory.member_count(),
        }
    }

    /// Register a new connection.
    ///
    /// Returns its identity and the receiving half of its outbound queue;
    /// the caller drains the receiver into the transport.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(self.config.outbound_buffer.max(1));
        let id = self.registry.register(tx);
        (id, rx)
    }

    /// Current session of a connection.
    #[must_use]
    pub fn session(&self, id: ConnectionId) -> Option<SessionState> {
        self.registry.session(id)
    }

    /// Decode and handle one raw inbound frame.
    ///
    /// Rejections are answered with a `system`/`error` frame on the
    /// connection's own queue and also returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns the rejection that was reported to the client.
    pub fn handle_frame(&self, id: ConnectionId, data: &[u8]) -> Result<(), RelayError> {
        let result = match codec::decode(data) {
            Ok(Decoded::Command(command)) => self.handle(id, command),
            Ok(Decoded::Ignored(kind)) => {
                debug!(connection = %id, kind = %kind, "Ignoring unknown frame type");
                Ok(())
            }
            Err(e) => Err(RelayError::from(e)),
        };

        if let Err(e) = &result {
            debug!(connection = %id, error = %e, "Command rejected");
            self.registry.deliver(id, e.to_frame());
        }

        result
    }

    /// Handle a decoded command.
    ///
    /// Unlike [`Relay::handle_frame`], rejections are only returned, not sent.
    ///
    /// # Errors
    ///
    /// Returns the rejection for this command.
    pub fn handle(&self, id: ConnectionId, command: ClientFrame) -> Result<(), RelayError> {
        match command {
            ClientFrame::Join(join) => self.apply(id, SessionEvent::Join(&join.room_id), None),
            ClientFrame::Chat(chat) => self.apply(id, SessionEvent::Chat, Some(&chat.msg)),
            ClientFrame::Leave => self.apply(id, SessionEvent::Leave, None),
        }
    }

    /// Run the transport-closed transition and forget the connection.
    ///
    /// Closes the connection's room, returning the remaining member to the
    /// lobby with a `ROOM_CLOSED` notice. Idempotent.
    pub fn disconnect(&self, id: ConnectionId) {
        if let Err(e) = self.apply(id, SessionEvent::TransportClosed, None) {
            warn!(connection = %id, error = %e, "Unexpected error during disconnect");
        }
        if self.registry.remove(id).is_some() {
            debug!(connection = %id, "Connection closed");
        }
    }

    fn apply(
        &self,
        id: ConnectionId,
        event: SessionEvent<'_>,
        text: Option<&str>,
    ) -> Result<(), RelayError> {
        let state = self.registry.session(id).unwrap_or(SessionState::Closed);

        match state.step(event)? {
            Step::Admit(room) => {
                let occupancy = self.directory.try_admit(&room, id)?;
                if !self
                    .registry
                    .set_session(id, SessionState::Joined(room.clone()))
                {
                    self.directory.evict(&room, id);
                    return Ok(());
                }
                info!(connection = %id, room = %room, occupancy, "Joined room");
                self.registry.deliver(
                    id,
                    ServerFrame::success(format!("Joined room '{}'", room)),
                );
            }
            Step::Route(_) => {
                self.router.route(id, text.unwrap_or_default())?;
            }
            Step::Depart { room, next } => {
                // A departure dissolves the room; whoever remains goes back
                // to the lobby.
                if let Some(closure) = self.directory.close(&room, id) {
                    let released: Vec<_> = closure
                        .remaining
                        .into_iter()
                        .filter(|member| self.registry.release(*member, &room))
                        .collect();
                    let notice = ServerFrame::info(SystemAction::RoomClosed, PEER_LEFT_MESSAGE);
                    self.router.notify(&released, &notice);
                    info!(
                        connection = %id,
                        room = %room,
                        released = released.len(),
                        "Left room, room closed"
                    );
                }
                self.registry.set_session(id, next);
            }
            Step::Become(next) => {
                self.registry.set_session(id, next);
            }
            Step::Ignore => {}
        }

        Ok(())
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}
