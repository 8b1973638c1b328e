//! Server Module
//!
//! Configuration loading, application state, and server initialization.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs    - Module exports
//! ├── config.rs - Environment-driven ServerConfig
//! ├── state.rs  - AppState and FromRef implementations
//! └── init.rs   - Store/mirror/engine wiring and app creation
//! ```

/// Configuration loading
pub mod config;

/// Application state
pub mod state;

/// Server initialization
pub mod init;

pub use config::{Environment, ServerConfig};
pub use init::create_app;
pub use state::AppState;
