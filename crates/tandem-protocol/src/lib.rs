//! # tandem-protocol
//!
//! Wire protocol definitions for the Tandem chat relay.
//!
//! Clients and the relay exchange JSON envelopes, one per WebSocket message.
//!
//! ## Frame Types
//!
//! Inbound (client to relay):
//!
//! - `join` - `{"roomId": ...}`
//! - `chat` - `{"msg": ...}`
//! - `leave` - no payload
//!
//! Outbound (relay to client):
//!
//! - `system` - `success` / `error` / `info` notices with an optional action tag
//! - `chat` - relayed text from a room peer
//!
//! ## Example
//!
//! ```rust
//! use tandem_protocol::{codec, ClientFrame, Decoded};
//!
//! let text = codec::encode_client(&ClientFrame::join("alpha")).unwrap();
//! let decoded = codec::decode(text.as_bytes()).unwrap();
//! assert_eq!(decoded, Decoded::Command(ClientFrame::join("alpha")));
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, Decoded, ProtocolError};
pub use frames::{
    ChatPayload, ChatRequest, ClientFrame, JoinPayload, ServerFrame, SystemAction, SystemKind,
    SystemPayload,
};
