//! Per-connection session state machine.
//!
//! ```text
//! Unjoined      --join (admitted)-->  Joined(room)
//! Joined(room)  --chat-->             Joined(room)
//! Joined(room)  --leave-->            Unjoined
//! Unjoined      --transport closed--> Closed
//! Joined(room)  --transport closed--> Closed
//! Joined(room)  --peer departed-->    Unjoined
//! ```
//!
//! The last row is not a [`Step`]: when one member departs, the relay
//! dissolves the room and releases everyone else in it.
//!
//! [`SessionState::step`] is pure: it decides what an event means in the
//! current state and returns the [`Step`] the relay has to carry out. The
//! relay owns the side effects (admission, routing, eviction) and stores the
//! resulting state in the registry.

use crate::directory::{validate_room_id, RoomId};
use crate::error::RelayError;

/// Session state of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connected, not in a room.
    #[default]
    Unjoined,
    /// Member of a room.
    Joined(RoomId),
    /// Transport closed. Terminal.
    Closed,
}

/// An input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent<'a> {
    /// Client asked to join a room.
    Join(&'a str),
    /// Client sent chat text.
    Chat,
    /// Client asked to leave its room.
    Leave,
    /// Transport went away.
    TransportClosed,
}

/// Work the relay must do for an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Ask the directory for a slot; on success the session becomes `Joined`.
    Admit(RoomId),
    /// Deliver chat to the other members of the room. State is unchanged.
    Route(RoomId),
    /// Close the room, release and notify whoever remains, then move to `next`.
    Depart { room: RoomId, next: SessionState },
    /// Move to a new state with no room side effects.
    Become(SessionState),
    /// Nothing to do.
    Ignore,
}

impl SessionState {
    /// The room this session is joined to.
    #[must_use]
    pub fn room(&self) -> Option<&str> {
        match self {
            SessionState::Joined(room) => Some(room),
            SessionState::Unjoined | SessionState::Closed => None,
        }
    }

    /// Check if the session is in a room.
    #[must_use]
    pub fn is_joined(&self) -> bool {
        matches!(self, SessionState::Joined(_))
    }

    /// Check if the session has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// Decide how to handle `event` in this state.
    ///
    /// # Errors
    ///
    /// Returns the rejection to report to the client: `AlreadyInRoom` for a
    /// join while joined, `InvalidRoomId` for an empty room id, and
    /// `NotInRoom` for chat while unjoined.
    pub fn step(&self, event: SessionEvent<'_>) -> Result<Step, RelayError> {
        match (self, event) {
            (SessionState::Closed, _) => Ok(Step::Ignore),

            (SessionState::Unjoined, SessionEvent::Join(room)) => {
                validate_room_id(room)?;
                Ok(Step::Admit(room.to_string()))
            }
            (SessionState::Joined(current), SessionEvent::Join(_)) => {
                Err(RelayError::AlreadyInRoom {
                    room: current.clone(),
                })
            }

            (SessionState::Unjoined, SessionEvent::Chat) => Err(RelayError::NotInRoom),
            (SessionState::Joined(room), SessionEvent::Chat) => Ok(Step::Route(room.clone())),

            (SessionState::Unjoined, SessionEvent::Leave) => Ok(Step::Ignore),
            (SessionState::Joined(room), SessionEvent::Leave) => Ok(Step::Depart {
                room: room.clone(),
                next: SessionState::Unjoined,
            }),

            (SessionState::Unjoined, SessionEvent::TransportClosed) => {
                Ok(Step::Become(SessionState::Closed))
            }
            (SessionState::Joined(room), SessionEvent::TransportClosed) => Ok(Step::Depart {
                room: room.clone(),
                next: SessionState::Closed,
            }),
        }
    }
}
