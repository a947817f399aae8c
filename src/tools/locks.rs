//! Per-file mutual exclusion for the mutating tools.
//!
//! `write_file` and `replace_in_file` read current content, compute a diff
//! or occurrence count, then write. Holding a [`FileLockGuard`] for the whole
//! sequence makes it atomic with respect to other mutations of the same
//! `(sandbox_id, path)`. Read-only tools never lock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockKey = (String, String);
type LockTable = DashMap<LockKey, Arc<Mutex<()>>>;

#[derive(Debug, Clone, Default)]
pub struct FileLocks {
    table: Arc<LockTable>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path` in `sandbox_id`. `path` must
    /// already be normalized.
    pub async fn lock(&self, sandbox_id: &str, path: &str) -> FileLockGuard {
        let key = (sandbox_id.to_string(), path.to_string());
        let mutex = self
            .table
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let guard = mutex.lock_owned().await;
        FileLockGuard {
            guard: Some(guard),
            key,
            table: Arc::clone(&self.table),
        }
    }

    /// Number of paths with a live lock entry.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

pub struct FileLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: LockKey,
    table: Arc<LockTable>,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table still references the mutex: nobody is waiting.
        self.table
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
