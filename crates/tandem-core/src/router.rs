//! Broadcast router.
//!
//! Delivers frames to the members of a sender's room. Recipients are always
//! computed as the room's membership minus the sender, so the router stays
//! correct for any room capacity.

use crate::directory::RoomDirectory;
use crate::error::RelayError;
use crate::registry::{ConnectionId, Registry};
use std::sync::Arc;
use tandem_protocol::ServerFrame;
use tracing::trace;

/// Result of a delivery attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Connections the frame was addressed to.
    pub recipients: usize,
    /// Connections whose queue accepted the frame.
    pub delivered: usize,
}

impl Delivery {
    /// Number of frames dropped (full or closed queues).
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.recipients - self.delivered
    }
}

/// Routes chat and notices between room members.
#[derive(Clone)]
pub struct Router {
    registry: Arc<Registry>,
    directory: Arc<RoomDirectory>,
}

impl Router {
    /// Create a router over the given registry and directory.
    #[must_use]
    pub fn new(registry: Arc<Registry>, directory: Arc<RoomDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    /// Relay chat text from `sender` to every other member of its room.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotInRoom`] if the sender has no room; nothing
    /// is delivered in that case.
    pub fn route(&self, sender: ConnectionId, text: &str) -> Result<Delivery, RelayError> {
        let room = self
            .registry
            .lookup_room(sender)
            .ok_or(RelayError::NotInRoom)?;

        // The session can briefly outlive a closed room; only members of the
        // room as it stands now may speak in it.
        let members = self.directory.members(&room);
        if !members.contains(&sender) {
            return Err(RelayError::NotInRoom);
        }
        let recipients: Vec<_> = members
            .into_iter()
            .filter(|member| *member != sender)
            .collect();

        let delivery = self.notify(&recipients, &ServerFrame::chat(text));
        trace!(
            connection = %sender,
            room = %room,
            recipients = delivery.recipients,
            delivered = delivery.delivered,
            "Routed chat"
        );
        Ok(delivery)
    }

    /// Deliver a frame to each recipient, best-effort.
    pub fn notify(&self, recipients: &[ConnectionId], frame: &ServerFrame) -> Delivery {
        let delivered = recipients
            .iter()
            .filter(|id| self.registry.deliver(**id, frame.clone()))
            .count();

        Delivery {
            recipients: recipients.len(),
            delivered,
        }
    }
}
