//! Relay error taxonomy.
//!
//! Every error is local to the connection that caused it. Most map to a
//! `system`/`error` frame sent back to that connection.

use tandem_protocol::{ProtocolError, ServerFrame, SystemAction};
use thiserror::Error;

use crate::directory::RoomId;

/// Errors surfaced while handling a client command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Frame could not be decoded.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Room has no free slot.
    #[error("Room '{room}' is full")]
    RoomFull { room: RoomId },

    /// Chat attempted without an active room membership.
    #[error("You must join a room before sending messages")]
    NotInRoom,

    /// Join attempted while already in a room.
    #[error("Already in room '{room}', leave it before joining another")]
    AlreadyInRoom { room: RoomId },

    /// Room identifier rejected.
    #[error("Invalid room id: {0}")]
    InvalidRoomId(&'static str),
}

impl RelayError {
    /// Action tag reported to the client.
    #[must_use]
    pub fn action(&self) -> SystemAction {
        match self {
            RelayError::MalformedFrame(_) | RelayError::InvalidRoomId(_) => {
                SystemAction::MalformedFrame
            }
            RelayError::RoomFull { .. } => SystemAction::RoomFull,
            RelayError::NotInRoom => SystemAction::NotInRoom,
            RelayError::AlreadyInRoom { .. } => SystemAction::AlreadyInRoom,
        }
    }

    /// The error frame sent back to the offending connection.
    #[must_use]
    pub fn to_frame(&self) -> ServerFrame {
        ServerFrame::error(self.action(), self.to_string())
    }
}

impl From<ProtocolError> for RelayError {
    fn from(err: ProtocolError) -> Self {
        RelayError::MalformedFrame(err.to_string())
    }
}
