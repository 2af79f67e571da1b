//! Room directory.
//!
//! Rooms are created by the first admission and deleted when a member
//! departs ([`RoomDirectory::close`]) or the last member is evicted; an empty
//! room is never left in the map. Admission, eviction and closing for one
//! room run under that room's map entry lock, so the capacity check and the
//! membership change are a single atomic step.

use crate::error::RelayError;
use crate::registry::ConnectionId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::debug;

/// Number of members a room can hold. Chat is strictly pairwise.
pub const ROOM_CAPACITY: usize = 2;

/// A room identifier, chosen by the client.
pub type RoomId = String;

/// Validate a room identifier.
///
/// # Errors
///
/// Returns an error if the identifier is empty.
pub fn validate_room_id(room_id: &str) -> Result<(), RelayError> {
    if room_id.is_empty() {
        return Err(RelayError::InvalidRoomId("room id cannot be empty"));
    }
    Ok(())
}

/// Members of a single room.
#[derive(Debug, Default)]
pub struct Room {
    members: HashSet<ConnectionId>,
}

impl Room {
    /// Number of members; always equal to the size of the member set.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.members.len()
    }

    /// Check if a connection is a member.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains(&id)
    }

    /// Member identities in ascending order.
    #[must_use]
    pub fn members(&self) -> Vec<ConnectionId> {
        let mut members: Vec<_> = self.members.iter().copied().collect();
        members.sort_unstable();
        members
    }

    /// Check if the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Outcome of removing a member from a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    /// Other members at the time of removal. After [`RoomDirectory::close`]
    /// they are no longer in the room either.
    pub remaining: Vec<ConnectionId>,
    /// Whether the room was deleted because it became empty.
    pub room_deleted: bool,
}

/// Maps room identifiers to their members.
pub struct RoomDirectory {
    rooms: DashMap<RoomId, Room>,
    capacity: usize,
}

impl RoomDirectory {
    /// Create a directory with the standard pairwise capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(ROOM_CAPACITY)
    }

    /// Create a directory with a custom per-room capacity (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Per-room capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admit a connection into a room, creating the room if needed.
    ///
    /// Returns the occupancy after admission. Admitting a connection that is
    /// already a member is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RoomFull`] when the room is at capacity.
    pub fn try_admit(&self, room_id: &str, id: ConnectionId) -> Result<usize, RelayError> {
        match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let room = entry.get_mut();
                if room.contains(id) {
                    return Ok(room.occupancy());
                }
                if room.occupancy() >= self.capacity {
                    debug!(room = %room_id, connection = %id, "Admission rejected, room full");
                    return Err(RelayError::RoomFull {
                        room: room_id.to_string(),
                    });
                }
                room.members.insert(id);
                debug!(room = %room_id, connection = %id, occupancy = room.occupancy(), "Admitted");
                Ok(room.occupancy())
            }
            Entry::Vacant(entry) => {
                let mut room = Room::default();
                room.members.insert(id);
                entry.insert(room);
                debug!(room = %room_id, connection = %id, "Created room");
                Ok(1)
            }
        }
    }

    /// Remove a connection from a room, deleting the room if it empties.
    ///
    /// Returns `None` if the room does not exist or the connection is not a
    /// member.
    pub fn evict(&self, room_id: &str, id: ConnectionId) -> Option<Eviction> {
        let Entry::Occupied(mut entry) = self.rooms.entry(room_id.to_string()) else {
            return None;
        };

        if !entry.get_mut().members.remove(&id) {
            return None;
        }

        let remaining = entry.get().members();
        let room_deleted = remaining.is_empty();
        if room_deleted {
            entry.remove();
            debug!(room = %room_id, "Deleted empty room");
        } else {
            debug!(room = %room_id, connection = %id, occupancy = remaining.len(), "Evicted");
        }

        Some(Eviction {
            remaining,
            room_deleted,
        })
    }

    /// Remove `id` from a room and dissolve the room.
    ///
    /// Everyone else in the room is drained out with it, under the same entry
    /// lock, and returned in `remaining`. Returns `None` if the room does not
    /// exist or `id` is not a member.
    pub fn close(&self, room_id: &str, id: ConnectionId) -> Option<Eviction> {
        let Entry::Occupied(entry) = self.rooms.entry(room_id.to_string()) else {
            return None;
        };

        if !entry.get().contains(id) {
            return None;
        }

        let (_, room) = entry.remove_entry();
        let remaining: Vec<_> = room
            .members()
            .into_iter()
            .filter(|member| *member != id)
            .collect();
        debug!(room = %room_id, connection = %id, drained = remaining.len(), "Closed room");

        Some(Eviction {
            remaining,
            room_deleted: true,
        })
    }

    /// Current members of a room (empty if the room does not exist).
    #[must_use]
    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.members())
            .unwrap_or_default()
    }

    /// Current occupancy of a room (0 if the room does not exist).
    #[must_use]
    pub fn occupancy(&self, room_id: &str) -> usize {
        self.rooms
            .get(room_id)
            .map(|room| room.occupancy())
            .unwrap_or(0)
    }

    /// Check if a room exists.
    #[must_use]
    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Number of rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Check if there are no rooms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Total members across all rooms.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.rooms.iter().map(|room| room.occupancy()).sum()
    }

    /// All room identifiers.
    #[must_use]
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ids(n: u64) -> Vec<ConnectionId> {
        (1..=n).map(ConnectionId::from_raw).collect()
    }

    #[test]
    fn test_admit_creates_room() {
        let directory = RoomDirectory::new();
        let a = ConnectionId::from_raw(1);

        assert!(!directory.contains("alpha"));
        assert_eq!(directory.try_admit("alpha", a).unwrap(), 1);
        assert!(directory.contains("alpha"));
        assert_eq!(directory.members("alpha"), vec![a]);
    }

    #[test]
    fn test_third_admit_is_rejected() {
        let directory = RoomDirectory::new();
        let members = ids(3);

        assert_eq!(directory.try_admit("beta", members[0]).unwrap(), 1);
        assert_eq!(directory.try_admit("beta", members[1]).unwrap(), 2);
        assert!(matches!(
            directory.try_admit("beta", members[2]),
            Err(RelayError::RoomFull { ref room }) if room == "beta"
        ));
        assert_eq!(directory.occupancy("beta"), 2);
        assert!(!directory.members("beta").contains(&members[2]));
    }

    #[test]
    fn test_readmit_is_noop() {
        let directory = RoomDirectory::new();
        let a = ConnectionId::from_raw(1);

        directory.try_admit("alpha", a).unwrap();
        assert_eq!(directory.try_admit("alpha", a).unwrap(), 1);
        assert_eq!(directory.occupancy("alpha"), 1);
    }

    #[test]
    fn test_evict_deletes_empty_room() {
        let directory = RoomDirectory::new();
        let members = ids(2);
        directory.try_admit("alpha", members[0]).unwrap();
        directory.try_admit("alpha", members[1]).unwrap();

        let eviction = directory.evict("alpha", members[0]).unwrap();
        assert_eq!(eviction.remaining, vec![members[1]]);
        assert!(!eviction.room_deleted);
        assert_eq!(directory.occupancy("alpha"), 1);

        let eviction = directory.evict("alpha", members[1]).unwrap();
        assert!(eviction.remaining.is_empty());
        assert!(eviction.room_deleted);
        assert!(!directory.contains("alpha"));
        assert!(directory.is_empty());
    }

    #[test]
    fn test_evict_is_idempotent() {
        let directory = RoomDirectory::new();
        let members = ids(2);
        directory.try_admit("alpha", members[0]).unwrap();
        directory.try_admit("alpha", members[1]).unwrap();

        assert!(directory.evict("alpha", members[0]).is_some());
        assert!(directory.evict("alpha", members[0]).is_none());
        assert!(directory.evict("missing", members[0]).is_none());
        assert_eq!(directory.occupancy("alpha"), 1);
    }

    #[test]
    fn test_refill_after_deletion() {
        let directory = RoomDirectory::new();
        let members = ids(4);
        directory.try_admit("alpha", members[0]).unwrap();
        directory.try_admit("alpha", members[1]).unwrap();
        directory.evict("alpha", members[0]);
        directory.evict("alpha", members[1]);

        assert_eq!(directory.try_admit("alpha", members[2]).unwrap(), 1);
        assert_eq!(directory.try_admit("alpha", members[3]).unwrap(), 2);
    }

    #[test]
    fn test_close_drains_whole_room() {
        let directory = RoomDirectory::new();
        let members = ids(4);
        directory.try_admit("alpha", members[0]).unwrap();
        directory.try_admit("alpha", members[1]).unwrap();

        let closure = directory.close("alpha", members[0]).unwrap();
        assert_eq!(closure.remaining, vec![members[1]]);
        assert!(closure.room_deleted);
        assert!(!directory.contains("alpha"));
        assert_eq!(directory.member_count(), 0);

        // Both slots are free for a new pair.
        assert_eq!(directory.try_admit("alpha", members[2]).unwrap(), 1);
        assert_eq!(directory.try_admit("alpha", members[3]).unwrap(), 2);
    }

    #[test]
    fn test_close_requires_membership() {
        let directory = RoomDirectory::new();
        let members = ids(3);
        directory.try_admit("alpha", members[0]).unwrap();

        assert!(directory.close("alpha", members[2]).is_none());
        assert!(directory.close("missing", members[0]).is_none());
        assert_eq!(directory.occupancy("alpha"), 1);

        let closure = directory.close("alpha", members[0]).unwrap();
        assert!(closure.remaining.is_empty());
        assert!(directory.close("alpha", members[0]).is_none());
    }

    #[test]
    fn test_concurrent_admits_respect_capacity() {
        let directory = Arc::new(RoomDirectory::new());

        let handles: Vec<_> = (1..=32)
            .map(|raw| {
                let directory = Arc::clone(&directory);
                std::thread::spawn(move || {
                    directory
                        .try_admit("contested", ConnectionId::from_raw(raw))
                        .is_ok()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, ROOM_CAPACITY);
        assert_eq!(directory.occupancy("contested"), ROOM_CAPACITY);
        assert_eq!(directory.members("contested").len(), ROOM_CAPACITY);
    }

    #[test]
    fn test_room_id_validation() {
        assert!(validate_room_id("alpha").is_ok());
        assert!(validate_room_id("").is_err());
    }

    #[test]
    fn test_member_count() {
        let directory = RoomDirectory::with_capacity(3);
        let members = ids(4);
        for id in &members[..3] {
            directory.try_admit("wide", *id).unwrap();
        }
        directory.try_admit("other", members[3]).unwrap();

        assert_eq!(directory.capacity(), 3);
        assert_eq!(directory.member_count(), 4);
        assert_eq!(directory.len(), 2);
    }
}
