/**
 * Event Broadcasting
 *
 * Fan-out primitive delivering server events to connections. Each
 * connection registers an unbounded mpsc sender at connect time; the
 * gateway's writer task drains the receiving end into the socket.
 *
 * # Delivery Semantics
 *
 * Broadcasts use the room registry's live membership at the moment of
 * the call. There is no buffering or queuing: a member that leaves while
 * a broadcast is in flight may or may not receive it, and a connection
 * whose channel is closed is silently skipped. Both races are accepted.
 */

use crate::protocol::ServerEvent;
use crate::sync::rooms::{ConnectionId, RoomRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Per-connection outbound channel
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Delivers events to one connection or fans out to a room
///
/// Cheap to clone; all clones share the sender table and room registry.
#[derive(Clone)]
pub struct Broadcaster {
    senders: Arc<Mutex<HashMap<ConnectionId, EventSender>>>,
    rooms: Arc<RoomRegistry>,
}

impl Broadcaster {
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        Self {
            senders: Arc::new(Mutex::new(HashMap::new())),
            rooms,
        }
    }

    /// Register a connection's outbound channel
    pub fn register(&self, connection_id: ConnectionId, sender: EventSender) {
        let mut senders = self.senders.lock().expect("broadcaster lock poisoned");
        senders.insert(connection_id, sender);
    }

    /// Remove a connection's outbound channel
    pub fn unregister(&self, connection_id: ConnectionId) {
        let mut senders = self.senders.lock().expect("broadcaster lock poisoned");
        senders.remove(&connection_id);
    }

    /// Deliver an event to exactly one connection
    ///
    /// A no-op if the connection is gone or its channel has closed.
    pub fn send_to_one(&self, connection_id: ConnectionId, event: ServerEvent) {
        let senders = self.senders.lock().expect("broadcaster lock poisoned");
        if let Some(sender) = senders.get(&connection_id) {
            if sender.send(event).is_err() {
                tracing::debug!(
                    "[Broadcast] Channel closed for connection {connection_id}, dropping event"
                );
            }
        }
    }

    /// Deliver an event to every current member of a room except `exclude`
    ///
    /// Membership is read from the room registry at call time.
    pub fn broadcast_to_room(
        &self,
        room_key: &str,
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    ) {
        let members = self.rooms.members(room_key);
        if members.is_empty() {
            return;
        }

        let senders = self.senders.lock().expect("broadcaster lock poisoned");
        let mut delivered = 0usize;
        for member in members {
            if Some(member) == exclude {
                continue;
            }
            if let Some(sender) = senders.get(&member) {
                if sender.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        tracing::debug!(
            "[Broadcast] {} -> {room_key}: delivered to {delivered} member(s)",
            event.kind()
        );
    }

    /// Deliver a uniform error-shaped event to one connection
    pub fn send_error(&self, connection_id: ConnectionId, message: impl Into<String>) {
        self.send_to_one(
            connection_id,
            ServerEvent::Error {
                message: message.into(),
            },
        );
    }
}
