//! Per-table mutual exclusion.
//!
//! Every load-mutate-rewrite cycle and every append runs while holding the
//! table's lock, so two writers in one process never interleave on a file.
//! Locks are process-local; separate processes sharing a data directory are
//! not coordinated.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Lock registry keyed by table file path.
#[derive(Debug, Default)]
pub struct TableLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for a table file, created on first use.
    pub fn handle(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of tables that have been locked at least once.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Acquire a handle's guard.
///
/// A poisoned lock only means another writer panicked mid-cycle; the file
/// itself was replaced atomically, so the guard is recovered.
pub fn acquire(handle: &Mutex<()>) -> MutexGuard<'_, ()> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_path_shares_lock() {
        let locks = TableLocks::new();
        let a = locks.handle(Path::new("/x/users.jsonl"));
        let b = locks.handle(Path::new("/x/users.jsonl"));
        let c = locks.handle(Path::new("/x/orders.jsonl"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_serializes_writers() {
        let locks = Arc::new(TableLocks::new());
        let counter = Arc::new(Mutex::new(Vec::new()));

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    let handle = locks.handle(Path::new("/x/t.jsonl"));
                    let _guard = acquire(&handle);
                    let mut seen = counter.lock().unwrap();
                    seen.push(i);
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(counter.lock().unwrap().len(), 4);
    }
}
