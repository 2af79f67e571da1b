//! Frame types for the Tandem protocol.
//!
//! Every frame is a JSON envelope carried in a single WebSocket message.
//! Clients send [`ClientFrame`]s; the relay answers with [`ServerFrame`]s.

use serde::{Deserialize, Serialize};

/// Client frame type names, as they appear in the `type` field.
pub mod kinds {
    pub const JOIN: &str = "join";
    pub const CHAT: &str = "chat";
    pub const LEAVE: &str = "leave";
}

/// A command sent by a client.
///
/// Serialization produces the envelope the browser client emits, e.g.
/// `{"type":"join","payload":{"roomId":"alpha"}}`. Decoding goes through
/// [`crate::codec::decode`], which also handles unknown and malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Join a room.
    Join(JoinPayload),
    /// Send chat text to the room peer(s).
    Chat(ChatRequest),
    /// Leave the current room.
    Leave,
}

/// Payload of a `join` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPayload {
    /// Room identifier chosen by the client.
    #[serde(rename = "roomId")]
    pub room_id: String,
}

/// Payload of an inbound `chat` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Chat text.
    pub msg: String,
}

impl ClientFrame {
    /// Create a join frame.
    #[must_use]
    pub fn join(room_id: impl Into<String>) -> Self {
        ClientFrame::Join(JoinPayload {
            room_id: room_id.into(),
        })
    }

    /// Create a chat frame.
    #[must_use]
    pub fn chat(msg: impl Into<String>) -> Self {
        ClientFrame::Chat(ChatRequest { msg: msg.into() })
    }

    /// Create a leave frame.
    #[must_use]
    pub fn leave() -> Self {
        ClientFrame::Leave
    }

    /// The wire name of this frame's type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::Join(_) => kinds::JOIN,
            ClientFrame::Chat(_) => kinds::CHAT,
            ClientFrame::Leave => kinds::LEAVE,
        }
    }
}

/// Severity of a system frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemKind {
    /// Join accepted.
    Success,
    /// Command rejected.
    Error,
    /// Informational notice (peer departure).
    Info,
}

/// Machine-readable reason attached to error and info frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemAction {
    RoomFull,
    NotInRoom,
    AlreadyInRoom,
    MalformedFrame,
    RoomClosed,
}

impl SystemAction {
    /// The tag as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemAction::RoomFull => "ROOM_FULL",
            SystemAction::NotInRoom => "NOT_IN_ROOM",
            SystemAction::AlreadyInRoom => "ALREADY_IN_ROOM",
            SystemAction::MalformedFrame => "MALFORMED_FRAME",
            SystemAction::RoomClosed => "ROOM_CLOSED",
        }
    }
}

impl std::fmt::Display for SystemAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a system frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPayload {
    /// Human-readable text shown to the user.
    pub message: String,
    /// Machine-readable tag; absent on plain success notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<SystemAction>,
}

/// Payload of an outbound chat frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Relayed chat text.
    pub message: String,
}

/// A frame sent by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Relay status notice.
    System {
        #[serde(rename = "messageType")]
        message_type: SystemKind,
        payload: SystemPayload,
    },

    /// Chat text from a room peer.
    Chat { payload: ChatPayload },
}

impl ServerFrame {
    /// Create a success notice.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        ServerFrame::System {
            message_type: SystemKind::Success,
            payload: SystemPayload {
                message: message.into(),
                action: None,
            },
        }
    }

    /// Create an error notice.
    #[must_use]
    pub fn error(action: SystemAction, message: impl Into<String>) -> Self {
        ServerFrame::System {
            message_type: SystemKind::Error,
            payload: SystemPayload {
                message: message.into(),
                action: Some(action),
            },
        }
    }

    /// Create an informational notice.
    #[must_use]
    pub fn info(action: SystemAction, message: impl Into<String>) -> Self {
        ServerFrame::System {
            message_type: SystemKind::Info,
            payload: SystemPayload {
                message: message.into(),
                action: Some(action),
            },
        }
    }

    /// Create a relayed chat frame.
    #[must_use]
    pub fn chat(message: impl Into<String>) -> Self {
        ServerFrame::Chat {
            payload: ChatPayload {
                message: message.into(),
            },
        }
    }

    /// The action tag of a system frame, if any.
    #[must_use]
    pub fn action(&self) -> Option<SystemAction> {
        match self {
            ServerFrame::System { payload, .. } => payload.action,
            ServerFrame::Chat { .. } => None,
        }
    }

    /// The system kind, or `None` for chat frames.
    #[must_use]
    pub fn system_kind(&self) -> Option<SystemKind> {
        match self {
            ServerFrame::System { message_type, .. } => Some(*message_type),
            ServerFrame::Chat { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_frames_match_browser_envelope() {
        assert_eq!(
            serde_json::to_value(ClientFrame::join("alpha")).unwrap(),
            json!({"type": "join", "payload": {"roomId": "alpha"}})
        );
        assert_eq!(
            serde_json::to_value(ClientFrame::chat("hi")).unwrap(),
            json!({"type": "chat", "payload": {"msg": "hi"}})
        );
        assert_eq!(
            serde_json::to_value(ClientFrame::leave()).unwrap(),
            json!({"type": "leave"})
        );
    }

    #[test]
    fn test_system_frame_shape() {
        let frame = ServerFrame::error(SystemAction::RoomFull, "Room is full");
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({
                "type": "system",
                "messageType": "error",
                "payload": {"message": "Room is full", "action": "ROOM_FULL"}
            })
        );

        let success = serde_json::to_value(ServerFrame::success("joined")).unwrap();
        assert!(success["payload"].get("action").is_none());
    }

    #[test]
    fn test_chat_frame_shape() {
        assert_eq!(
            serde_json::to_value(ServerFrame::chat("hi")).unwrap(),
            json!({"type": "chat", "payload": {"message": "hi"}})
        );
    }

    #[test]
    fn test_action_accessor() {
        let info = ServerFrame::info(SystemAction::RoomClosed, "bye");
        assert_eq!(info.action(), Some(SystemAction::RoomClosed));
        assert_eq!(info.system_kind(), Some(SystemKind::Info));
        assert_eq!(ServerFrame::chat("x").action(), None);
        assert_eq!(SystemAction::NotInRoom.to_string(), "NOT_IN_ROOM");
    }
}
