//! Synchronization Module
//!
//! The collaborative file-synchronization core: room membership, event
//! fan-out, per-file write serialization, patch application, and the
//! engine that ties them into the join/edit/save/cursor/presence
//! protocol.
//!
//! # Module Structure
//!
//! ```text
//! sync/
//! ├── mod.rs       - Module exports
//! ├── rooms.rs     - RoomRegistry and room-key derivation
//! ├── broadcast.rs - Broadcaster fan-out primitive
//! ├── locks.rs     - Per-file serialization locks
//! ├── patch.rs     - TextPatch and atomic patch application
//! └── engine.rs    - SyncEngine protocol handlers
//! ```
//!
//! # Concurrency Model
//!
//! Handlers run per inbound message and suspend at storage I/O, so
//! messages from different connections interleave freely. The only
//! exclusion scopes are the per-file locks (collaborative edit and save
//! for one path are serialized end-to-end) and the registry's per-call
//! mutex. Cursor and presence traffic needs no exclusion; its events
//! commute.

/// Room membership registry
pub mod rooms;

/// Event fan-out
pub mod broadcast;

/// Per-file serialization locks
pub mod locks;

/// Patch application
pub mod patch;

/// The synchronization engine
pub mod engine;

pub use broadcast::Broadcaster;
pub use engine::SyncEngine;
pub use rooms::{file_room, user_room, ConnectionId, RoomRegistry};
