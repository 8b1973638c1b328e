//! CollabFS - Realtime Multi-User File Collaboration Backend
//!
//! CollabFS is a realtime collaboration server: clients open a persistent
//! WebSocket connection, join a room keyed by a file's path, and receive
//! synchronized updates to that file's content, cursor positions, and
//! presence as other participants edit it.
//!
//! # Module Structure
//!
//! - **`protocol`** - Inbound messages and outbound events (JSON, tagged)
//! - **`sync`** - The synchronization core: rooms, broadcast fan-out,
//!   per-file write serialization, patch application, and the engine
//! - **`storage`** - Content store (SQLite) and filesystem mirror
//! - **`gateway`** - WebSocket transport wiring
//! - **`server`** - Configuration, application state, initialization
//! - **`routes`** - Router assembly
//! - **`error`** - Error taxonomy and conversion to error events
//!
//! # Core Guarantees
//!
//! - Broadcasts reach every room member except the originator, using live
//!   membership at the moment of the call
//! - Collaborative edits and saves against one file are serialized end to
//!   end, so concurrent writers cannot lose updates
//! - Patch sets apply atomically: any mismatch rejects the whole set with
//!   stored content unchanged
//! - Saves are verified against a post-fsync readback before they are
//!   acknowledged

/// Error taxonomy and conversions
pub mod error;

/// Wire protocol types
pub mod protocol;

/// Content store and filesystem mirror
pub mod storage;

/// The synchronization core
pub mod sync;

/// WebSocket transport
pub mod gateway;

/// Configuration, state, and initialization
pub mod server;

/// Router assembly
pub mod routes;
