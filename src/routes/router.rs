/**
 * Router Configuration
 *
 * Combines the gateway route and ancillary endpoints into the Axum
 * router. The synchronization protocol lives entirely on the WebSocket
 * route; HTTP CRUD for file metadata is an external collaborator and has
 * no routes here.
 */

use crate::gateway::ws_handler;
use crate::server::state::AppState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Create the Axum router with all routes configured
///
/// # Routes
///
/// - `GET /ws` - WebSocket upgrade into the synchronization protocol
/// - `GET /health` - process liveness
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Liveness probe
async fn health() -> &'static str {
    "ok"
}
