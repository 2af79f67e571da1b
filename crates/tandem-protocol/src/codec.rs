//! Codec for decoding client frames and encoding server frames.
//!
//! Frames are JSON text. Decoding is two-staged: the envelope (`type` plus an
//! optional `payload`) is read first, then the payload is checked against the
//! shape the type requires. Unknown types are reported as
//! [`Decoded::Ignored`] rather than as errors so that newer clients can talk
//! to an older relay.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::frames::{kinds, ChatRequest, ClientFrame, JoinPayload, ServerFrame};

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame bytes are not valid UTF-8.
    #[error("Frame is not valid UTF-8")]
    NotUtf8,

    /// Frame is not a well-formed JSON object.
    #[error("Frame is not a JSON object: {0}")]
    NotJson(String),

    /// Envelope has no string `type` field.
    #[error("Frame is missing a string 'type' field")]
    MissingType,

    /// Payload is absent or has the wrong shape for the frame type.
    #[error("Invalid payload for '{kind}' frame: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },

    /// Encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result of decoding an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A recognized command.
    Command(ClientFrame),
    /// A well-formed envelope with an unrecognized type.
    Ignored(String),
}

/// Decode a client frame from raw bytes.
///
/// # Errors
///
/// Returns an error if the frame is not UTF-8 JSON, lacks a `type`, or
/// carries a payload that does not fit its type.
pub fn decode(data: &[u8]) -> Result<Decoded, ProtocolError> {
    let text = std::str::from_utf8(data).map_err(|_| ProtocolError::NotUtf8)?;
    decode_str(text)
}

/// Decode a client frame from text.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_str(text: &str) -> Result<Decoded, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::NotJson(e.to_string()))?;
    let Value::Object(mut envelope) = value else {
        return Err(ProtocolError::NotJson("expected an object".to_string()));
    };

    let kind = match envelope.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => return Err(ProtocolError::MissingType),
    };
    let body = envelope.remove("payload");

    let frame = match kind.as_str() {
        kinds::JOIN => ClientFrame::Join(payload::<JoinPayload>(kinds::JOIN, body)?),
        kinds::CHAT => ClientFrame::Chat(payload::<ChatRequest>(kinds::CHAT, body)?),
        kinds::LEAVE => ClientFrame::Leave,
        _ => return Ok(Decoded::Ignored(kind)),
    };

    Ok(Decoded::Command(frame))
}

fn payload<T: DeserializeOwned>(
    kind: &'static str,
    payload: Option<Value>,
) -> Result<T, ProtocolError> {
    let value = payload.ok_or_else(|| ProtocolError::InvalidPayload {
        kind,
        reason: "missing payload".to_string(),
    })?;

    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

/// Encode a server frame to JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(frame: &ServerFrame) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(frame)?)
}

/// Encode a client frame to JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_client(frame: &ClientFrame) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode a server frame from text, as a client would.
///
/// # Errors
///
/// Returns an error if the text is not a valid server frame.
pub fn decode_server(text: &str) -> Result<ServerFrame, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::NotJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::SystemAction;

    #[test]
    fn test_decode_commands() {
        assert_eq!(
            decode(br#"{"type":"join","payload":{"roomId":"alpha"}}"#).unwrap(),
            Decoded::Command(ClientFrame::join("alpha"))
        );
        assert_eq!(
            decode(br#"{"type":"chat","payload":{"msg":"hi"}}"#).unwrap(),
            Decoded::Command(ClientFrame::chat("hi"))
        );
        assert_eq!(
            decode(br#"{"type":"leave"}"#).unwrap(),
            Decoded::Command(ClientFrame::Leave)
        );
        assert_eq!(
            decode(br#"{"type":"leave","payload":{}}"#).unwrap(),
            Decoded::Command(ClientFrame::Leave)
        );
    }

    #[test]
    fn test_client_encoding_is_decodable() {
        let text = encode_client(&ClientFrame::join("room-1")).unwrap();
        assert_eq!(
            decode_str(&text).unwrap(),
            Decoded::Command(ClientFrame::join("room-1"))
        );
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        assert_eq!(
            decode(br#"{"type":"typing","payload":{"on":true}}"#).unwrap(),
            Decoded::Ignored("typing".to_string())
        );
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(decode(b"not json"), Err(ProtocolError::NotJson(_))));
        assert!(matches!(decode(b"[1,2,3]"), Err(ProtocolError::NotJson(_))));
        assert!(matches!(decode(&[0xff, 0xfe]), Err(ProtocolError::NotUtf8)));
        assert!(matches!(
            decode(br#"{"payload":{"msg":"hi"}}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            decode(br#"{"type":7}"#),
            Err(ProtocolError::MissingType)
        ));
    }

    #[test]
    fn test_payload_shape_is_checked() {
        assert!(matches!(
            decode(br#"{"type":"join"}"#),
            Err(ProtocolError::InvalidPayload { kind: "join", .. })
        ));
        assert!(matches!(
            decode(br#"{"type":"join","payload":{"room":"alpha"}}"#),
            Err(ProtocolError::InvalidPayload { kind: "join", .. })
        ));
        assert!(matches!(
            decode(br#"{"type":"chat","payload":{"msg":42}}"#),
            Err(ProtocolError::InvalidPayload { kind: "chat", .. })
        ));
    }

    #[test]
    fn test_server_frame_text() {
        let frame = ServerFrame::info(SystemAction::RoomClosed, "Your partner left");
        let text = encode(&frame).unwrap();
        assert!(text.contains(r#""messageType":"info""#));
        assert!(text.contains(r#""action":"ROOM_CLOSED""#));
        assert_eq!(decode_server(&text).unwrap(), frame);
    }
}
