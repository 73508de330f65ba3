use std::sync::{Mutex, MutexGuard, PoisonError};

use super::source::ProcessRow;

/// The mutable region of a process record. Everything here is guarded by the
/// record's own lock so a reader can inspect one process without contending
/// with structural changes on the containing snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordState {
    pub parent_pid: u32,
    pub module_id: u32,
    pub memory_usage: u64,
    pub thread_count: u32,
    pub priority_class: i32,
    pub name: String,
    pub selected: bool,
    /// Liveness marker: set when the current polling cycle re-enumerates this
    /// pid, cleared at the end of every cycle.
    pub seen: bool,
}

/// One process. The pid is the stable identity and never changes; all other
/// fields live behind the per-record lock.
#[derive(Debug)]
pub struct ProcessRecord {
    pid: u32,
    state: Mutex<RecordState>,
}

impl ProcessRecord {
    pub fn from_row(row: &ProcessRow) -> Self {
        let mut state = RecordState::default();
        apply_row(&mut state, row);
        state.seen = true;
        ProcessRecord {
            pid: row.pid,
            state: Mutex::new(state),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Scoped access to the mutable region.
    pub fn lock(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refresh fields from a freshly enumerated row and mark the record seen
    /// this cycle. Fields the row omits keep their previous values.
    pub fn apply(&self, row: &ProcessRow) {
        let mut state = self.lock();
        apply_row(&mut state, row);
        state.seen = true;
    }

    pub fn select(&self) {
        self.lock().selected = true;
    }

    pub fn deselect(&self) {
        self.lock().selected = false;
    }

    pub fn is_selected(&self) -> bool {
        self.lock().selected
    }

    pub fn mark_seen(&self) {
        self.lock().seen = true;
    }

    pub fn clear_seen(&self) {
        self.lock().seen = false;
    }

    pub fn is_seen(&self) -> bool {
        self.lock().seen
    }

    /// Deep copy with the selection flag cleared. The copying container
    /// re-applies selection by pid, never by object identity.
    pub fn duplicate(&self) -> ProcessRecord {
        let mut state = self.lock().clone();
        state.selected = false;
        ProcessRecord {
            pid: self.pid,
            state: Mutex::new(state),
        }
    }
}

fn apply_row(state: &mut RecordState, row: &ProcessRow) {
    if let Some(parent_pid) = row.parent_pid {
        state.parent_pid = parent_pid;
    }
    if let Some(module_id) = row.module_id {
        state.module_id = module_id;
    }
    state.memory_usage = row.memory_usage;
    if let Some(thread_count) = row.thread_count {
        state.thread_count = thread_count;
    }
    if let Some(priority_class) = row.priority_class {
        state.priority_class = priority_class;
    }
    if !row.name.is_empty() && state.name != row.name {
        state.name = row.name.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_row(pid: u32) -> ProcessRow {
        ProcessRow {
            pid,
            parent_pid: Some(1),
            module_id: Some(7),
            memory_usage: 4096,
            thread_count: Some(3),
            priority_class: Some(20),
            name: "worker".to_string(),
        }
    }

    #[test]
    fn from_row_marks_seen() {
        let record = ProcessRecord::from_row(&full_row(42));
        assert_eq!(record.pid(), 42);
        assert!(record.is_seen());
        assert!(!record.is_selected());
    }

    #[test]
    fn partial_row_keeps_previous_fields() {
        let record = ProcessRecord::from_row(&full_row(42));
        record.clear_seen();

        // Access-denied style row: only pid and memory available.
        let partial = ProcessRow {
            pid: 42,
            parent_pid: None,
            module_id: None,
            memory_usage: 8192,
            thread_count: None,
            priority_class: None,
            name: String::new(),
        };
        record.apply(&partial);

        let state = record.lock();
        assert_eq!(state.memory_usage, 8192);
        assert_eq!(state.parent_pid, 1);
        assert_eq!(state.thread_count, 3);
        assert_eq!(state.priority_class, 20);
        assert_eq!(state.name, "worker");
        assert!(state.seen);
    }

    #[test]
    fn duplicate_is_independent_and_deselected() {
        let record = ProcessRecord::from_row(&full_row(42));
        record.select();

        let copy = record.duplicate();
        assert_eq!(copy.pid(), 42);
        assert!(!copy.is_selected());

        copy.lock().memory_usage = 1;
        assert_eq!(record.lock().memory_usage, 4096);
    }

    #[test]
    fn seen_flag_round_trip() {
        let record = ProcessRecord::from_row(&full_row(1));
        record.clear_seen();
        assert!(!record.is_seen());
        record.mark_seen();
        assert!(record.is_seen());
    }
}
