//! Shared test harness
//!
//! Builds a synchronization engine over an in-memory content store and a
//! tempdir mirror root, and attaches plain mpsc receivers as connections
//! so tests observe exactly what each connection would receive.

use collabfs::protocol::ServerEvent;
use collabfs::storage::{ContentStore, Mirror};
use collabfs::sync::{Broadcaster, ConnectionId, RoomRegistry, SyncEngine};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct TestServer {
    pub engine: Arc<SyncEngine>,
    pub mirror: Mirror,
    // Held so the mirror root outlives the test body.
    _dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_detail(true).await
    }

    pub async fn start_with_detail(include_error_detail: bool) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ContentStore::connect("sqlite::memory:")
            .await
            .expect("in-memory store");
        let mirror = Mirror::new(dir.path());
        let rooms = Arc::new(RoomRegistry::new());
        let broadcaster = Broadcaster::new(rooms.clone());
        let engine = Arc::new(SyncEngine::new(
            store,
            mirror.clone(),
            rooms,
            broadcaster,
            include_error_detail,
        ));
        Self {
            engine,
            mirror,
            _dir: dir,
        }
    }

    /// Attach a connection, returning its id and event receiver
    pub fn attach(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.engine.connect(id, tx);
        (id, rx)
    }
}

/// Drain every event currently queued for a connection
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Pop the single queued event, failing if zero or more than one arrived
pub fn expect_one(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    let events = drain(rx);
    assert_eq!(
        events.len(),
        1,
        "expected exactly one event, got {events:?}"
    );
    events.into_iter().next().unwrap()
}
