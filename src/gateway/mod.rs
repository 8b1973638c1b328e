//! Gateway Module
//!
//! WebSocket transport wiring: connection acceptance, identifier
//! assignment, and the per-connection read/write loops that bridge the
//! socket to the synchronization engine.

/// WebSocket upgrade handler and connection loop
pub mod ws;

pub use ws::ws_handler;
