/**
 * Per-File Serialization Locks
 *
 * Collaborative edits and saves against the same file must not interleave
 * their load -> apply -> persist sequences: both steps suspend at I/O, so
 * two near-simultaneous requests could each load the same stale base and
 * the second persist would silently discard the first (lost update).
 *
 * This map hands out one async mutex per file path. Holding the owned
 * guard across the whole operation serializes writers for that path while
 * leaving unrelated paths fully concurrent. This is a deliberate
 * hardening over the naive handler flow.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Map of file path to its serialization lock
///
/// Lock entries are pruned opportunistically once no operation holds or
/// awaits them, so idle files leave no bookkeeping behind.
#[derive(Debug, Default)]
pub struct FileLockMap {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FileLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `path`, suspending until it is free
    ///
    /// The returned guard must be held across the entire
    /// load -> apply -> persist sequence.
    pub async fn acquire(&self, path: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("file lock map poisoned");
            // Prune entries nobody holds before handing out a new guard.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry(path.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of live lock entries (test/diagnostic aid)
    pub fn len(&self) -> usize {
        self.locks.lock().expect("file lock map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
