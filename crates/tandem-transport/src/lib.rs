//! # tandem-transport
//!
//! Transport abstraction layer for the Tandem chat relay.
//!
//! - **WebSocket** - axum upgraded sockets, the production transport
//! - **Memory** - in-process pairs for driving the server in tests
//!
//! ## Transport Abstraction
//!
//! Every transport implements [`Connection`], which splits into a
//! [`FrameSink`] and a [`FrameStream`], so the server's connection loop
//! is protocol-agnostic.
//!
//! ```rust,ignore
//! use tandem_transport::{Connection, FrameStream, Inbound};
//!
//! async fn read_all<C: Connection>(conn: C) {
//!     let (_sink, mut stream) = conn.split();
//!     while let Ok(Some(Inbound::Frame(bytes))) = stream.recv().await {
//!         // Process frame
//!     }
//! }
//! ```

pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use memory::{MemoryConnection, MemoryPeer, Outgoing};
pub use traits::{Connection, FrameSink, FrameStream, Inbound, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;
