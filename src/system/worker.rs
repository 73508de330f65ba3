use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

/// Lifecycle of a background polling thread.
///
/// `Stopping` is transient: the worker finishes its current cycle, parks, and
/// reports `Idle` again. The thread itself stays alive across stop/run pairs;
/// only `Terminated` tears it down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Stopping,
    Terminated,
}

/// One unit of background work, invoked once per polling cycle while the
/// worker is running.
pub trait PollTask: Send + 'static {
    fn poll(&mut self);
}

struct Shared {
    state: Mutex<WorkerState>,
    signal: Condvar,
    interval_ms: AtomicU64,
}

/// Generic start/stop/terminate state machine around a dedicated OS thread.
///
/// The thread is spawned parked in `Idle`; `run` makes it poll, `stop` parks
/// it after the in-flight cycle drains, `terminate` exits the loop and joins.
pub struct Worker {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn spawn<T: PollTask>(task: T, interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(WorkerState::Idle),
            signal: Condvar::new(),
            interval_ms: AtomicU64::new(clamp_interval(interval)),
        });
        let handle = std::thread::spawn({
            let shared = Arc::clone(&shared);
            move || worker_main(shared, task)
        });
        Worker {
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Idempotent: starts polling from `Idle` (or re-arms a `Stopping` worker),
    /// no-op while already running or after termination.
    pub fn run(&self) {
        let mut state = self.lock_state();
        match *state {
            WorkerState::Idle | WorkerState::Stopping => {
                *state = WorkerState::Running;
                self.shared.signal.notify_all();
            }
            WorkerState::Running | WorkerState::Terminated => {}
        }
    }

    /// Cooperative pause: the worker drains its current cycle and parks.
    pub fn stop(&self) {
        let mut state = self.lock_state();
        if *state == WorkerState::Running {
            *state = WorkerState::Stopping;
            self.shared.signal.notify_all();
        }
    }

    /// Exit the polling loop and join the thread. Valid from any state; not
    /// reversible.
    pub fn terminate(&self) {
        {
            let mut state = self.lock_state();
            *state = WorkerState::Terminated;
            self.shared.signal.notify_all();
        }
        let handle = {
            let mut slot = self
                .handle
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slot.take()
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.lock_state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Stored atomically; the new value takes effect at the worker's next
    /// sleep, never mid-sleep.
    pub fn set_interval(&self, interval: Duration) {
        self.shared
            .interval_ms
            .store(clamp_interval(interval), Ordering::Relaxed);
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.shared.interval_ms.load(Ordering::Relaxed))
    }

    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn clamp_interval(interval: Duration) -> u64 {
    (interval.as_millis() as u64).max(1)
}

fn worker_main<T: PollTask>(shared: Arc<Shared>, mut task: T) {
    let mut state = shared
        .state
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    loop {
        match *state {
            WorkerState::Terminated => {
                debug!("worker terminated");
                return;
            }
            WorkerState::Idle => {
                state = shared
                    .signal
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            WorkerState::Stopping => {
                debug!("worker parked");
                *state = WorkerState::Idle;
                shared.signal.notify_all();
            }
            WorkerState::Running => {
                drop(state);
                task.poll();

                let interval =
                    Duration::from_millis(shared.interval_ms.load(Ordering::Relaxed));
                let deadline = Instant::now() + interval;
                state = shared
                    .state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                // Interruptible sleep: a stop or terminate signal cuts the
                // wait short instead of stalling teardown for a full interval.
                while *state == WorkerState::Running {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let (guard, _timeout) = shared
                        .signal
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }
    }
}
