/**
 * Error Conversion
 *
 * Converts `SyncError` values into the sender-directed error events of the
 * wire protocol. Conversion happens once, at the engine's dispatch
 * boundary, so individual handlers only propagate `SyncError`.
 *
 * # Event Mapping
 *
 * - Save operations report every failure through `save_error`
 *   (`to_save_event`), with debug-formatted diagnostic detail included
 *   only in non-production deployment mode
 * - Patch rejections map to `collab_error`
 * - Everything else maps to the generic `error` event
 */

use crate::error::types::SyncError;
use crate::protocol::event::ServerEvent;

impl SyncError {
    /// Convert this error into the generic sender-directed event
    ///
    /// Used for every operation except save, whose failures always go
    /// through `to_save_event`.
    pub fn to_event(&self) -> ServerEvent {
        match self {
            Self::PatchApply { .. } => ServerEvent::CollabError {
                message: self.to_string(),
            },
            _ => ServerEvent::Error {
                message: self.to_string(),
            },
        }
    }

    /// Convert a save failure into its dedicated error event
    ///
    /// `include_detail` is the deployment-mode gate: when false,
    /// diagnostic detail is omitted from the payload entirely.
    pub fn to_save_event(&self, include_detail: bool) -> ServerEvent {
        ServerEvent::SaveError {
            error: self.to_string(),
            detail: include_detail.then(|| format!("{self:?}")),
        }
    }
}
