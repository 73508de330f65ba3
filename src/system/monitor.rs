use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use super::record::ProcessRecord;
use super::registry::ProcessRegistry;
use super::snapshot::Snapshot;
use super::source::ProcessSource;
use super::worker::{PollTask, Worker, WorkerState};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(1000);

struct SharedData {
    live: Snapshot,
    /// Raised after the first successful publish.
    ready: AtomicBool,
    /// Number of consumers currently holding a [`SnapshotHandle`]; nonzero
    /// means the live snapshot is checked out and must not be republished.
    readers: AtomicUsize,
    num_processes: AtomicUsize,
    skipped_publishes: AtomicU64,
}

/// Owns the sampling worker and the live [`Snapshot`], and arbitrates
/// producer/consumer access to it.
///
/// One monitor serves the whole application: construct it at the root and
/// hand an `Arc` of it to every consumer.
pub struct ProcessMonitor {
    data: Arc<SharedData>,
    worker: Worker,
}

impl ProcessMonitor {
    pub fn new(source: impl ProcessSource + 'static, interval: Duration) -> Self {
        let data = Arc::new(SharedData {
            live: Snapshot::new(),
            ready: AtomicBool::new(false),
            readers: AtomicUsize::new(0),
            num_processes: AtomicUsize::new(0),
            skipped_publishes: AtomicU64::new(0),
        });
        let cycle = PollCycle {
            source: Box::new(source),
            registry: ProcessRegistry::new(),
            data: Arc::clone(&data),
        };
        let worker = Worker::spawn(cycle, interval);
        ProcessMonitor { data, worker }
    }

    /// Start (or resume) sampling. Idempotent.
    pub fn run(&self) {
        self.worker.run();
    }

    /// Pause sampling after the in-flight cycle drains; `run` resumes cheaply
    /// without respawning the thread.
    pub fn stop(&self) {
        self.worker.stop();
    }

    /// Shut the worker down for good and join its thread.
    pub fn terminate(&self) {
        self.worker.terminate();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Takes effect at the worker's next sleep; the current sleep finishes on
    /// the old interval.
    pub fn set_update_interval(&self, interval: Duration) {
        self.worker.set_interval(interval);
    }

    pub fn update_interval(&self) -> Duration {
        self.worker.interval()
    }

    /// Entry count of the last published snapshot.
    pub fn num_processes(&self) -> usize {
        self.data.num_processes.load(Ordering::Relaxed)
    }

    /// Cycles that finished while the snapshot was checked out and therefore
    /// kept the previous publish.
    pub fn skipped_publishes(&self) -> u64 {
        self.data.skipped_publishes.load(Ordering::Relaxed)
    }

    /// Acquire half of the hand-off: checks the live snapshot out for shared
    /// reading and raises the busy signal, which makes the worker skip
    /// publishing until every handle is dropped. Returns `None` before the
    /// first publish.
    ///
    /// Dropping the returned handle is the release half; record references
    /// obtained through it must not outlive it.
    pub fn acquire(&self) -> Option<SnapshotHandle<'_>> {
        if !self.data.ready.load(Ordering::Acquire) {
            return None;
        }
        self.data.readers.fetch_add(1, Ordering::AcqRel);
        Some(SnapshotHandle { data: &self.data })
    }
}

impl Drop for ProcessMonitor {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Shared, ownership-checked view of the live snapshot. Holding it keeps the
/// producer from swapping in a new record set; dropping it releases the hold.
pub struct SnapshotHandle<'a> {
    data: &'a SharedData,
}

impl Deref for SnapshotHandle<'_> {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.data.live
    }
}

impl Drop for SnapshotHandle<'_> {
    fn drop(&mut self) {
        self.data.readers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One polling cycle: enumerate, diff/merge into the registry, sweep exited
/// processes, publish. Runs on the worker thread.
struct PollCycle {
    source: Box<dyn ProcessSource>,
    registry: ProcessRegistry,
    data: Arc<SharedData>,
}

impl PollTask for PollCycle {
    fn poll(&mut self) {
        // Enumeration happens outside every lock; only the merge and the
        // final publish touch shared state.
        let rows = match self.source.enumerate() {
            Ok(rows) => rows,
            Err(err) => {
                // The previous snapshot stays authoritative; retry on the
                // next scheduled cycle.
                warn!(error = %err, "process enumeration failed");
                return;
            }
        };

        for row in &rows {
            match self.registry.get(row.pid) {
                Some(record) => record.apply(row),
                None => self
                    .registry
                    .insert(Arc::new(ProcessRecord::from_row(row))),
            }
        }

        // Removal detection runs only after the full enumeration pass, so a
        // pid touched this cycle can never be swept.
        let vanished = self.registry.sweep_unseen();
        if !vanished.is_empty() {
            debug!(count = vanished.len(), "processes exited");
        }
        self.registry.clear_seen();

        if self.data.readers.load(Ordering::Acquire) == 0 {
            self.data.live.sync_with(&self.registry);
            self.data
                .num_processes
                .store(self.registry.len(), Ordering::Relaxed);
            self.data.ready.store(true, Ordering::Release);
            debug!(processes = self.registry.len(), "snapshot published");
        } else {
            // Snapshot is checked out; keep serving the previous publish and
            // fold this cycle's changes into the next one.
            self.data
                .skipped_publishes
                .fetch_add(1, Ordering::Relaxed);
            debug!("snapshot checked out, publish deferred");
        }
    }
}
