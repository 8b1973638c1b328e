/**
 * Inbound Protocol Messages
 *
 * Named messages arriving over a persistent connection, dispatched into
 * the synchronization engine. The wire format is a JSON object with a
 * `type` discriminator, mirroring the named-event protocol the clients
 * speak.
 *
 * # Identity Scheme
 *
 * File identity is path-keyed throughout: a normalized, user-rooted
 * relative path. There is no parallel id-keyed variant of any message.
 *
 * # Permissiveness
 *
 * The protocol does not enforce join-before-edit. An edit, save, or
 * cursor message for a path this connection never joined is still
 * serviced. That behavior is externally observable and intentional.
 */

use crate::sync::patch::TextPatch;
use serde::{Deserialize, Serialize};

/// Cursor position within a file, as reported by a client
///
/// Positions are opaque to the server. They are recorded per connection
/// and relayed to the room without interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    /// Zero-based line index
    pub line: u64,
    /// Zero-based column index
    pub column: u64,
}

/// A named message received from a client connection
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the room for a file, resolving its current content
    JoinFile {
        /// Normalized user-rooted relative path
        path: String,
        /// Identifier of the user opening the file
        user_id: String,
    },

    /// Broadcast-only edit: relay a change description to the room
    ///
    /// The lightweight keystroke path. Nothing is persisted and no
    /// conflict resolution happens server-side.
    FileEdit {
        path: String,
        /// Opaque change description, relayed verbatim
        changes: serde_json::Value,
    },

    /// Collaborative edit: apply a patch set against the current content
    ///
    /// The system of record for reconciliation. The whole set applies or
    /// the whole set is rejected.
    CollabEdit {
        path: String,
        patches: Vec<TextPatch>,
        /// Client-declared version tag, echoed in the broadcast
        version: u64,
    },

    /// Save full replacement content with durable-write verification
    SaveFile {
        path: String,
        user_id: String,
        content: String,
    },

    /// Fire-and-forget cursor position update
    CursorUpdate {
        path: String,
        position: CursorPosition,
    },

    /// Announce presence in a file's room
    Presence { path: String, user_id: String },

    /// Leave a file's room
    LeaveFile { path: String },

    /// Any message whose `type` is not part of the protocol
    ///
    /// Produces a generic error event rather than being silently dropped.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Short name of the message type, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinFile { .. } => "join_file",
            Self::FileEdit { .. } => "file_edit",
            Self::CollabEdit { .. } => "collab_edit",
            Self::SaveFile { .. } => "save_file",
            Self::CursorUpdate { .. } => "cursor_update",
            Self::Presence { .. } => "presence",
            Self::LeaveFile { .. } => "leave_file",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_join_file_deserializes() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"join_file","path":"notes/todo.md","user_id":"u1"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::JoinFile { path, user_id } => {
                assert_eq!(path, "notes/todo.md");
                assert_eq!(user_id, "u1");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_collab_edit_carries_patches() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"collab_edit","path":"a.txt","version":3,
                "patches":[{"start":0,"delete":"hi","insert":"hello"}]}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::CollabEdit {
                patches, version, ..
            } => {
                assert_eq!(version, 3);
                assert_eq!(patches.len(), 1);
                assert_eq!(patches[0].insert, "hello");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized_type_becomes_unknown() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"launch_missiles"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Unknown));
        assert_eq!(msg.kind(), "unknown");
    }
}
