/**
 * Application State Management
 *
 * Defines the application state shared with every gateway handler and
 * the `FromRef` implementation Axum uses to extract it.
 *
 * # Thread Safety
 *
 * The engine is shared behind an `Arc`; its interior state (connection
 * table, room registry, per-file locks) carries its own synchronization,
 * so `AppState` is a cheap clone.
 */

use crate::server::config::ServerConfig;
use crate::sync::SyncEngine;
use axum::extract::FromRef;
use std::sync::Arc;

/// Central state container for the Axum application
#[derive(Clone)]
pub struct AppState {
    /// The synchronization engine, constructed once in init
    pub engine: Arc<SyncEngine>,
    /// Resolved server configuration
    pub config: ServerConfig,
}

/// Allow handlers to extract the engine directly
impl FromRef<AppState> for Arc<SyncEngine> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.engine.clone()
    }
}
