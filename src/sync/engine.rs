/**
 * Synchronization Engine
 *
 * Owns the join/edit/save/cursor/presence protocol for every connection.
 * The engine resolves file identity through the content store and
 * filesystem mirror, admits connections into rooms, serializes writers
 * per file, and decides what is broadcast to whom.
 *
 * # State Machine
 *
 * Per (connection, file) pair the only states are UNJOINED and JOINED.
 * Edits are stateless operations performed while joined, and the protocol
 * deliberately does not enforce join-before-edit: an edit, save, or
 * cursor message for a never-joined path is still serviced, because
 * adding an implicit membership check would change externally observable
 * behavior.
 *
 * # Error Boundary
 *
 * `dispatch` is the single catch point. Handlers propagate `SyncError`;
 * the dispatcher converts each failure into the operation's
 * sender-directed error event. Nothing here terminates a connection or
 * the process.
 */

use crate::error::SyncError;
use crate::protocol::{ClientMessage, CursorPosition, PresenceAction, ServerEvent};
use crate::storage::{is_text_file, ContentStore, Mirror};
use crate::sync::broadcast::{Broadcaster, EventSender};
use crate::sync::locks::FileLockMap;
use crate::sync::patch::{apply_patches, TextPatch};
use crate::sync::rooms::{file_room, user_room, ConnectionId, RoomRegistry};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Per-connection bookkeeping
///
/// Created on transport connect, destroyed on disconnect. Destruction
/// drives the leave side effects for every room the connection was in.
#[derive(Debug, Default)]
struct ConnectionState {
    /// User identifier, learned from the first message that carries one
    user_id: Option<String>,
    /// Rooms this connection explicitly joined (file and user rooms)
    rooms: HashSet<String>,
    /// One-shot disconnect hooks: room key -> user id to announce leaving
    presences: HashMap<String, String>,
    /// Last-known cursor position per file path
    cursors: HashMap<String, CursorPosition>,
}

/// The collaborative file-synchronization core
///
/// Constructed once in server init from injected collaborators and shared
/// behind an `Arc` between the gateway and any tests driving it directly.
pub struct SyncEngine {
    store: ContentStore,
    mirror: Mirror,
    rooms: Arc<RoomRegistry>,
    broadcaster: Broadcaster,
    locks: FileLockMap,
    connections: Mutex<HashMap<ConnectionId, ConnectionState>>,
    /// Deployment-mode gate for diagnostic detail in save errors
    include_error_detail: bool,
}

impl SyncEngine {
    pub fn new(
        store: ContentStore,
        mirror: Mirror,
        rooms: Arc<RoomRegistry>,
        broadcaster: Broadcaster,
        include_error_detail: bool,
    ) -> Self {
        Self {
            store,
            mirror,
            rooms,
            broadcaster,
            locks: FileLockMap::new(),
            connections: Mutex::new(HashMap::new()),
            include_error_detail,
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Register a newly connected transport connection
    pub fn connect(&self, connection_id: ConnectionId, sender: EventSender) {
        self.broadcaster.register(connection_id, sender);
        let mut connections = self.connections.lock().expect("connection table poisoned");
        connections.insert(connection_id, ConnectionState::default());
        tracing::info!("[Sync] Connection {connection_id} registered");
    }

    /// Tear down a connection: leave every room and fire presence hooks
    ///
    /// Safe to call whether or not an operation just finished; an
    /// operation already in flight completes against storage on its own
    /// task and this cleanup only touches membership and fan-out state.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let state = {
            let mut connections = self.connections.lock().expect("connection table poisoned");
            connections.remove(&connection_id)
        };

        if let Some(state) = state {
            for room in &state.rooms {
                self.rooms.leave(room, connection_id);
            }
            for (room, user_id) in &state.presences {
                self.broadcaster.broadcast_to_room(
                    room,
                    ServerEvent::Presence {
                        user_id: user_id.clone(),
                        action: PresenceAction::Leave,
                        timestamp: Utc::now(),
                    },
                    Some(connection_id),
                );
            }
        }

        self.broadcaster.unregister(connection_id);
        tracing::info!("[Sync] Connection {connection_id} cleaned up");
    }

    /// Handle one inbound message, converting any failure into the
    /// operation's error event for the sender
    pub async fn dispatch(&self, connection_id: ConnectionId, message: ClientMessage) {
        tracing::debug!("[Sync] {} from {connection_id}", message.kind());

        let kind = message.kind();
        let result = match &message {
            ClientMessage::JoinFile { path, user_id } => {
                self.handle_join(connection_id, path, user_id).await
            }
            ClientMessage::FileEdit { path, changes } => {
                self.handle_file_edit(connection_id, path, changes.clone())
            }
            ClientMessage::CollabEdit {
                path,
                patches,
                version,
            } => {
                self.handle_collab_edit(connection_id, path, patches, *version)
                    .await
            }
            ClientMessage::SaveFile {
                path,
                user_id,
                content,
            } => self.handle_save(connection_id, path, user_id, content).await,
            ClientMessage::CursorUpdate { path, position } => {
                self.handle_cursor(connection_id, path, position.clone())
            }
            ClientMessage::Presence { path, user_id } => {
                self.handle_presence(connection_id, path, user_id)
            }
            ClientMessage::LeaveFile { path } => self.handle_leave(connection_id, path),
            ClientMessage::Unknown => Err(SyncError::UnknownMessage),
        };

        if let Err(err) = result {
            tracing::warn!("[Sync] {kind} from {connection_id} failed: {err}");
            let event = match message {
                ClientMessage::SaveFile { .. } => err.to_save_event(self.include_error_detail),
                ClientMessage::CollabEdit { .. } => ServerEvent::CollabError {
                    message: err.to_string(),
                },
                _ => err.to_event(),
            };
            self.broadcaster.send_to_one(connection_id, event);
        }
    }

    /// Join: resolve content, reconcile the mirror, admit to the room
    ///
    /// Atomic with respect to membership: every fallible step runs before
    /// the registry join, so a failed join leaves the connection exactly
    /// as it was.
    async fn handle_join(
        &self,
        connection_id: ConnectionId,
        path: &str,
        user_id: &str,
    ) -> Result<(), SyncError> {
        // Resolve also sanitizes both identity components.
        self.mirror.resolve(user_id, path)?;
        let record = self.store.find_by_path(path).await?;

        if !self.mirror.exists(user_id, path).await? {
            // Recreate the mirror copy from the store, or bootstrap an
            // empty file when the store has never seen this path either.
            let seed = record.as_ref().map(|r| r.content.as_str()).unwrap_or("");
            self.mirror.write(user_id, path, seed).await?;
        }

        let content = if is_text_file(path) {
            // Text files read fresh from the mirror: it is the source of
            // truth for live edits.
            self.mirror.read(user_id, path).await?
        } else {
            record.map(|r| r.content).unwrap_or_default()
        };

        let room = file_room(path);
        self.rooms.join(&room, connection_id);
        self.track_room(connection_id, &room);
        self.enroll_user(connection_id, user_id);

        self.broadcaster.send_to_one(
            connection_id,
            ServerEvent::FileJoined {
                path: path.to_string(),
                content,
                member_count: self.rooms.member_count(&room),
            },
        );
        tracing::info!("[Sync] {connection_id} joined {room}");
        Ok(())
    }

    /// Broadcast-only edit: republish the change description
    ///
    /// The lightweight keystroke path. No persistence and no conflict
    /// resolution; editors reconcile in their own buffers.
    fn handle_file_edit(
        &self,
        connection_id: ConnectionId,
        path: &str,
        changes: serde_json::Value,
    ) -> Result<(), SyncError> {
        self.broadcaster.broadcast_to_room(
            &file_room(path),
            ServerEvent::FileUpdate {
                path: path.to_string(),
                changes,
                sender: connection_id,
                timestamp: Utc::now(),
            },
            Some(connection_id),
        );
        Ok(())
    }

    /// Collaborative edit: apply a patch set atomically and persist
    ///
    /// The whole load -> apply -> persist sequence runs under the
    /// per-path lock, so concurrent edits against the same file cannot
    /// both apply against a stale base (lost-update guard). Receivers get
    /// the patch set, not the merged content.
    async fn handle_collab_edit(
        &self,
        connection_id: ConnectionId,
        path: &str,
        patches: &[TextPatch],
        version: u64,
    ) -> Result<(), SyncError> {
        crate::storage::mirror::sanitize_path(path)?;
        let _guard = self.locks.acquire(path).await;

        let base = self.load_authoritative(path).await?;
        let merged = apply_patches(&base, patches)?;

        self.store.write(path, &merged).await?;

        let timestamp = Utc::now();
        self.broadcaster.broadcast_to_room(
            &file_room(path),
            ServerEvent::CollabPatch {
                path: path.to_string(),
                patches: patches.to_vec(),
                version,
                sender: connection_id,
                timestamp,
            },
            Some(connection_id),
        );
        self.broadcaster.send_to_one(
            connection_id,
            ServerEvent::CollabApplied {
                path: path.to_string(),
                version,
                applied: patches.len(),
            },
        );

        // Mirror reconcile is best-effort: the edit is already persisted
        // and announced, so a mirror failure must not surface as a
        // rejection the room never heard about.
        if let Some(user_id) = self.user_of(connection_id) {
            if let Err(err) = self.mirror.write(&user_id, path, &merged).await {
                tracing::warn!("[Sync] Mirror reconcile of {path} for {user_id} failed: {err}");
            }
        }
        Ok(())
    }

    /// Save: verified full-content replacement
    ///
    /// Writes to the mirror with fsync and read-back verification, then
    /// persists the verified content to the store. Shares the per-path
    /// lock with collaborative edits so the two cannot interleave.
    async fn handle_save(
        &self,
        connection_id: ConnectionId,
        path: &str,
        user_id: &str,
        content: &str,
    ) -> Result<(), SyncError> {
        self.mirror.resolve(user_id, path)?;
        let _guard = self.locks.acquire(path).await;

        let verified = self.mirror.write_verified(user_id, path, content).await?;
        let record = self.store.write(path, &verified).await?;
        self.enroll_user(connection_id, user_id);

        self.broadcaster.send_to_one(
            connection_id,
            ServerEvent::FileSaved {
                path: path.to_string(),
                content: verified.clone(),
                user_id: user_id.to_string(),
                updated_at: record.updated_at,
            },
        );
        // Full-content push to the whole room, sender included: the saved
        // snapshot is authoritative for everyone.
        self.broadcaster.broadcast_to_room(
            &file_room(path),
            ServerEvent::FileContentUpdated {
                path: path.to_string(),
                content: verified,
                user_id: user_id.to_string(),
                updated_at: record.updated_at,
            },
            None,
        );
        // Cross-device sync carries the raw submitted content.
        self.broadcaster.broadcast_to_room(
            &user_room(user_id),
            ServerEvent::FileUpdatedRemote {
                path: path.to_string(),
                content: content.to_string(),
            },
            Some(connection_id),
        );
        tracing::info!("[Sync] {connection_id} saved {path} ({} bytes)", content.len());
        Ok(())
    }

    /// Cursor update: record and relay, fire-and-forget
    fn handle_cursor(
        &self,
        connection_id: ConnectionId,
        path: &str,
        position: CursorPosition,
    ) -> Result<(), SyncError> {
        {
            let mut connections = self.connections.lock().expect("connection table poisoned");
            if let Some(state) = connections.get_mut(&connection_id) {
                state.cursors.insert(path.to_string(), position.clone());
            }
        }
        self.broadcaster.broadcast_to_room(
            &file_room(path),
            ServerEvent::FileCursor {
                path: path.to_string(),
                sender: connection_id,
                position,
            },
            Some(connection_id),
        );
        Ok(())
    }

    /// Presence announce: join signal now, leave signal on disconnect
    fn handle_presence(
        &self,
        connection_id: ConnectionId,
        path: &str,
        user_id: &str,
    ) -> Result<(), SyncError> {
        // The id becomes a mirror directory name via enrollment, so it is
        // held to the same rules as join and save.
        crate::storage::mirror::sanitize_user_id(user_id)?;
        let room = file_room(path);
        self.broadcaster.broadcast_to_room(
            &room,
            ServerEvent::Presence {
                user_id: user_id.to_string(),
                action: PresenceAction::Join,
                timestamp: Utc::now(),
            },
            Some(connection_id),
        );

        self.enroll_user(connection_id, user_id);
        let mut connections = self.connections.lock().expect("connection table poisoned");
        if let Some(state) = connections.get_mut(&connection_id) {
            // One-shot disconnect hook for the symmetric leave event.
            state.presences.insert(room, user_id.to_string());
        }
        Ok(())
    }

    /// Leave: drop membership and acknowledge the leaver only
    ///
    /// No broadcast beyond what the presence disconnect hook provides.
    fn handle_leave(&self, connection_id: ConnectionId, path: &str) -> Result<(), SyncError> {
        let room = file_room(path);
        self.rooms.leave(&room, connection_id);
        {
            let mut connections = self.connections.lock().expect("connection table poisoned");
            if let Some(state) = connections.get_mut(&connection_id) {
                state.rooms.remove(&room);
            }
        }
        self.broadcaster.send_to_one(
            connection_id,
            ServerEvent::FileLeft {
                path: path.to_string(),
            },
        );
        Ok(())
    }

    /// Current base content for a collaborative edit
    ///
    /// Always the store: patch application must observe the latest
    /// persisted write regardless of which user's mirror copy exists,
    /// otherwise two collaborators with divergent mirror copies could
    /// each patch a stale base. An absent file yields empty content,
    /// matching the bootstrap behavior of join.
    async fn load_authoritative(&self, path: &str) -> Result<String, SyncError> {
        Ok(self
            .store
            .find_by_path(path)
            .await?
            .map(|r| r.content)
            .unwrap_or_default())
    }

    /// Last-known cursor position reported by a connection for a file
    pub fn cursor_of(&self, connection_id: ConnectionId, path: &str) -> Option<CursorPosition> {
        let connections = self.connections.lock().expect("connection table poisoned");
        connections
            .get(&connection_id)
            .and_then(|state| state.cursors.get(path).cloned())
    }

    fn user_of(&self, connection_id: ConnectionId) -> Option<String> {
        let connections = self.connections.lock().expect("connection table poisoned");
        connections
            .get(&connection_id)
            .and_then(|state| state.user_id.clone())
    }

    fn track_room(&self, connection_id: ConnectionId, room: &str) {
        let mut connections = self.connections.lock().expect("connection table poisoned");
        if let Some(state) = connections.get_mut(&connection_id) {
            state.rooms.insert(room.to_string());
        }
    }

    /// Record the connection's user id and admit it to the user's
    /// cross-device room
    fn enroll_user(&self, connection_id: ConnectionId, user_id: &str) {
        let room = user_room(user_id);
        self.rooms.join(&room, connection_id);
        let mut connections = self.connections.lock().expect("connection table poisoned");
        if let Some(state) = connections.get_mut(&connection_id) {
            state.user_id.get_or_insert_with(|| user_id.to_string());
            state.rooms.insert(room);
        }
    }
}
