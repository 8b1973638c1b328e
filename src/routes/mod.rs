//! Routes Module
//!
//! Axum router assembly.

/// Router creation
pub mod router;

pub use router::create_router;
