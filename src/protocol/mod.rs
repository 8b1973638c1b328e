//! Wire Protocol Module
//!
//! Named duplex events exchanged over a persistent connection: inbound
//! client messages and outbound server events, both serialized as JSON
//! objects with a `type` discriminator.
//!
//! # Module Structure
//!
//! ```text
//! protocol/
//! ├── mod.rs     - Module exports
//! ├── message.rs - Inbound ClientMessage
//! └── event.rs   - Outbound ServerEvent
//! ```

/// Inbound messages
pub mod message;

/// Outbound events
pub mod event;

pub use event::{PresenceAction, ServerEvent};
pub use message::{ClientMessage, CursorPosition};
