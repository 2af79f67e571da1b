//! # tandem-core
//!
//! Room and session bookkeeping for the Tandem chat relay.
//!
//! This crate provides the building blocks the server drives:
//!
//! - **Registry** - live connections, their sessions and outbound queues
//! - **RoomDirectory** - capacity-limited rooms and their members
//! - **Session** - the per-connection join/leave state machine
//! - **Router** - delivery of chat and notices to room peers
//! - **Relay** - all of the above behind one handle
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌───────────────┐
//! │  Connection │────▶│    Relay    │────▶│ RoomDirectory │
//! └─────────────┘     └─────────────┘     └───────────────┘
//!        ▲                   │
//!        │                   ▼
//!  outbound queue     ┌─────────────┐     ┌─────────────┐
//!        └────────────│   Router    │────▶│  Registry   │
//!                     └─────────────┘     └─────────────┘
//! ```

pub mod directory;
pub mod error;
pub mod registry;
pub mod relay;
pub mod router;
pub mod session;

pub use directory::{Eviction, Room, RoomDirectory, RoomId, ROOM_CAPACITY};
pub use error::RelayError;
pub use registry::{ConnectionId, Outbound, Registry};
pub use relay::{Relay, RelayConfig, RelayStats};
pub use router::{Delivery, Router};
pub use session::{SessionEvent, SessionState, Step};
