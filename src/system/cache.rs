use std::sync::Arc;

use super::monitor::ProcessMonitor;
use super::snapshot::Snapshot;
use crate::tasks::TaskQueue;

/// A consumer's private copy of the live snapshot.
///
/// The owner reads `snapshot()` freely (e.g. once per frame) while refreshes
/// check the live data out, deep-copy it, and release it on a queue thread.
/// The copy keeps the owner's selection across refreshes even though every
/// record object is replaced.
#[derive(Default)]
pub struct SnapshotCache {
    snapshot: Arc<Snapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Queue an off-thread deep copy of the current live snapshot into this
    /// cache. The acquire/release pair stays entirely on the queue thread, so
    /// the caller never blocks on the monitor.
    pub fn refresh(&self, monitor: &Arc<ProcessMonitor>, queue: &TaskQueue) {
        let snapshot = Arc::clone(&self.snapshot);
        let monitor = Arc::clone(monitor);
        queue.submit(move || {
            if let Some(live) = monitor.acquire()
                && !live.is_empty()
            {
                snapshot.copy_from(&live);
            }
        });
    }
}
