//! Error Module
//!
//! Error taxonomy for the synchronization core and its conversion to
//! sender-directed error events.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports
//! ├── types.rs      - SyncError taxonomy
//! └── conversion.rs - SyncError -> ServerEvent conversion
//! ```

/// Error taxonomy
pub mod types;

/// Conversion to protocol error events
pub mod conversion;

pub use types::SyncError;
