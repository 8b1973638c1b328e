/**
 * Outbound Protocol Events
 *
 * Events emitted by the synchronization engine, either to a single
 * connection or fanned out to a room. Serialized as JSON objects with a
 * `type` discriminator.
 *
 * # Delivery Scopes
 *
 * Each event documents its scope:
 * - "to sender" - delivered to the originating connection only
 * - "to room" - delivered to every room member
 * - "to room, excluding sender" - fan-out that skips the originator
 * - "to same-user connections" - other connections sharing a user id
 */

use crate::protocol::message::CursorPosition;
use crate::sync::patch::TextPatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Presence action carried by a presence event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceAction {
    Join,
    Leave,
}

/// A named event delivered to client connections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Join acknowledgement with current content and membership size
    ///
    /// To sender.
    FileJoined {
        path: String,
        content: String,
        member_count: usize,
    },

    /// Relayed broadcast-only edit
    ///
    /// To room, excluding sender.
    FileUpdate {
        path: String,
        changes: serde_json::Value,
        sender: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Accepted patch set from a collaborative edit
    ///
    /// To room, excluding sender. Carries the patches, not the merged
    /// content: receivers converge by applying the same patches to their
    /// own buffers.
    CollabPatch {
        path: String,
        patches: Vec<TextPatch>,
        version: u64,
        sender: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Per-operation acknowledgement of an accepted collaborative edit
    ///
    /// To sender. `applied` is the number of patches that applied, which
    /// on success equals the submitted count.
    CollabApplied {
        path: String,
        version: u64,
        applied: usize,
    },

    /// Rejected collaborative edit
    ///
    /// To sender only. Stored content is unchanged.
    CollabError { message: String },

    /// Save acknowledgement carrying the verified content
    ///
    /// To sender.
    FileSaved {
        path: String,
        content: String,
        user_id: String,
        updated_at: DateTime<Utc>,
    },

    /// Verified content push after a successful save
    ///
    /// To room.
    FileContentUpdated {
        path: String,
        content: String,
        user_id: String,
        updated_at: DateTime<Utc>,
    },

    /// Cross-device notification after a successful save
    ///
    /// To other connections of the same user. Carries the raw submitted
    /// content rather than the verified copy.
    FileUpdatedRemote { path: String, content: String },

    /// Save failure
    ///
    /// To sender only. `detail` is present only in non-production
    /// deployment mode.
    SaveError {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    /// Relayed cursor position
    ///
    /// To room, excluding sender.
    FileCursor {
        path: String,
        sender: Uuid,
        position: CursorPosition,
    },

    /// Presence join/leave signal
    ///
    /// To room, excluding sender.
    Presence {
        user_id: String,
        action: PresenceAction,
        timestamp: DateTime<Utc>,
    },

    /// Leave acknowledgement
    ///
    /// To sender.
    FileLeft { path: String },

    /// Generic handler failure
    ///
    /// To sender only.
    Error { message: String },
}

impl ServerEvent {
    /// Short name of the event type, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileJoined { .. } => "file_joined",
            Self::FileUpdate { .. } => "file_update",
            Self::CollabPatch { .. } => "collab_patch",
            Self::CollabApplied { .. } => "collab_applied",
            Self::CollabError { .. } => "collab_error",
            Self::FileSaved { .. } => "file_saved",
            Self::FileContentUpdated { .. } => "file_content_updated",
            Self::FileUpdatedRemote { .. } => "file_updated_remote",
            Self::SaveError { .. } => "save_error",
            Self::FileCursor { .. } => "file_cursor",
            Self::Presence { .. } => "presence",
            Self::FileLeft { .. } => "file_left",
            Self::Error { .. } => "error",
        }
    }
}
