/**
 * Server Initialization
 *
 * Builds the application from configuration: content store connection,
 * mirror root, room registry, broadcaster, synchronization engine, and
 * finally the router.
 *
 * # Initialization Flow
 *
 * 1. Connect the content store and ensure its schema
 * 2. Create the mirror root directory if absent
 * 3. Construct the room registry and broadcaster (one per process,
 *    injected into the engine rather than reached through globals)
 * 4. Construct the engine and assemble the router
 *
 * A failed store connection or unusable mirror root is fatal: the server
 * cannot provide its core guarantees without either.
 */

use crate::error::SyncError;
use crate::routes::router::create_router;
use crate::server::config::ServerConfig;
use crate::server::state::AppState;
use crate::storage::{ContentStore, Mirror};
use crate::sync::{Broadcaster, RoomRegistry, SyncEngine};
use axum::Router;
use std::sync::Arc;

/// Create and configure the Axum application
pub async fn create_app(config: ServerConfig) -> Result<Router, SyncError> {
    tracing::info!("[Init] Initializing collabfs server");

    let store = ContentStore::connect(&config.database_url).await?;
    tracing::info!("[Init] Content store ready at {}", config.database_url);

    tokio::fs::create_dir_all(&config.storage_root).await?;
    let mirror = Mirror::new(&config.storage_root);
    tracing::info!("[Init] Mirror root at {}", config.storage_root.display());

    let rooms = Arc::new(RoomRegistry::new());
    let broadcaster = Broadcaster::new(rooms.clone());
    let engine = Arc::new(SyncEngine::new(
        store,
        mirror,
        rooms,
        broadcaster,
        config.include_error_detail(),
    ));

    tracing::info!("[Init] Synchronization engine ready");
    Ok(create_router(AppState { engine, config }))
}
