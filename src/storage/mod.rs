//! Storage Module
//!
//! The two halves of file persistence: the durable path-addressed content
//! store (SQLite) and the per-user on-disk filesystem mirror used as the
//! live-edit fast path. The synchronization engine keeps them convergent
//! after every accepted write.
//!
//! # Module Structure
//!
//! ```text
//! storage/
//! ├── mod.rs    - Module exports
//! ├── store.rs  - ContentStore (sqlx/SQLite) and FileRecord
//! └── mirror.rs - Filesystem mirror, sanitization, verified writes
//! ```

/// Durable content store
pub mod store;

/// On-disk mirror
pub mod mirror;

pub use mirror::{is_text_file, Mirror};
pub use store::{ContentStore, FileRecord};
