/**
 * Room Registry
 *
 * Maps a room key to the set of currently connected participant
 * identifiers. Rooms are created implicitly on first join and their
 * bookkeeping is dropped when the last member leaves, so an idle server
 * carries no empty-room state.
 *
 * # Room Keys
 *
 * File rooms use `file:{path}` and user rooms (cross-device save
 * notifications) use `user:{userId}`. Key derivation lives next to the
 * registry so every caller produces identical keys.
 *
 * # Thread Safety
 *
 * All membership mutation happens under a single `Mutex`, making each
 * operation atomic per call. `members` returns a snapshot, so a broadcast
 * iterating it never observes a torn membership set.
 */

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

/// Transport-assigned connection identifier
pub type ConnectionId = Uuid;

/// Derive the room key for a file path
pub fn file_room(path: &str) -> String {
    format!("file:{path}")
}

/// Derive the room key for a user's cross-device room
pub fn user_room(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// Registry of room membership, shared between the engine and broadcaster
///
/// Constructed once per process and injected; there is no ambient global
/// registry.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, HashSet<ConnectionId>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Idempotent; never fails.
    pub fn join(&self, room_key: &str, connection_id: ConnectionId) {
        let mut rooms = self.rooms.lock().expect("room registry lock poisoned");
        rooms
            .entry(room_key.to_string())
            .or_default()
            .insert(connection_id);
    }

    /// Remove a connection from a room. Idempotent; a no-op if absent.
    ///
    /// Drops the room's entry entirely when the last member leaves.
    pub fn leave(&self, room_key: &str, connection_id: ConnectionId) {
        let mut rooms = self.rooms.lock().expect("room registry lock poisoned");
        if let Some(members) = rooms.get_mut(room_key) {
            members.remove(&connection_id);
            if members.is_empty() {
                rooms.remove(room_key);
            }
        }
    }

    /// Number of currently connected members of a room
    pub fn member_count(&self, room_key: &str) -> usize {
        let rooms = self.rooms.lock().expect("room registry lock poisoned");
        rooms.get(room_key).map_or(0, HashSet::len)
    }

    /// Snapshot of a room's membership at the moment of the call
    ///
    /// Used for fan-out and exclusion only; the snapshot is detached from
    /// the live set.
    pub fn members(&self, room_key: &str) -> Vec<ConnectionId> {
        let rooms = self.rooms.lock().expect("room registry lock poisoned");
        rooms
            .get(room_key)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one member (test/diagnostic aid)
    pub fn room_count(&self) -> usize {
        self.rooms.lock().expect("room registry lock poisoned").len()
    }
}
