/**
 * Synchronization Error Types
 *
 * This module defines the error taxonomy for the file-collaboration core.
 * Every failure that can surface from a handler is represented here and
 * converted to a sender-directed error event at the dispatch boundary.
 *
 * # Error Categories
 *
 * - `NotFound` - A file identity could not be resolved
 * - `InvalidIdentity` - Path traversal or malformed user/file identity
 * - `WriteVerification` - Post-write read-back did not match the intended content
 * - `PatchApply` - One or more patches were rejected against the current base
 * - `Io` - Underlying filesystem error
 * - `Database` - Content store error
 * - `Serialization` - JSON encoding/decoding failure
 * - `UnknownMessage` - Inbound message type is not part of the protocol
 *
 * # Propagation Policy
 *
 * Handlers return `Result<(), SyncError>`. The engine's dispatch loop
 * catches every variant and emits an error event to the originating
 * connection. Errors never terminate the connection or the process.
 */

use thiserror::Error;

/// Errors produced by the synchronization core
///
/// `PatchApply` and `WriteVerification` guarantee that persisted state is
/// left unchanged: the failing operation is rejected as a whole.
#[derive(Debug, Error)]
pub enum SyncError {
    /// File identity unresolvable in both the mirror and the content store
    #[error("File not found: {path}")]
    NotFound {
        /// The normalized path that failed to resolve
        path: String,
    },

    /// Path traversal or malformed user/file identity
    ///
    /// Raised before any filesystem access is attempted.
    #[error("Invalid identity: {reason}")]
    InvalidIdentity {
        /// Human-readable description of what was rejected
        reason: String,
    },

    /// Post-write read-back mismatch
    ///
    /// The mirror write completed, but reading the file back produced
    /// different bytes than were written. The save is not acknowledged.
    #[error("Write verification failed for {path}")]
    WriteVerification {
        /// Path whose on-disk content diverged from the intended content
        path: String,
    },

    /// A patch was rejected against the current base content
    #[error("Patch {index} failed to apply: {reason}")]
    PatchApply {
        /// Zero-based index of the rejected patch in the submitted set
        index: usize,
        /// Why the patch did not apply cleanly
        reason: String,
    },

    /// Underlying filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Content store error
    #[error("Storage error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Inbound message type is not part of the protocol
    #[error("Unknown message type")]
    UnknownMessage,
}

impl SyncError {
    /// Create a not-found error for a path
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an invalid-identity error
    pub fn invalid_identity(reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            reason: reason.into(),
        }
    }

    /// Create a write-verification error for a path
    pub fn write_verification(path: impl Into<String>) -> Self {
        Self::WriteVerification { path: path.into() }
    }

    /// Create a patch-apply error for the patch at `index`
    pub fn patch_apply(index: usize, reason: impl Into<String>) -> Self {
        Self::PatchApply {
            index,
            reason: reason.into(),
        }
    }
}
