use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::record::ProcessRecord;
use super::registry::ProcessRegistry;

/// A point-in-time view of the process table: an ordered sequence of records
/// plus at most one selected process.
///
/// The container lock guards structural changes (add/remove/replace) and the
/// selection; per-record field access goes through each record's own lock.
/// Selection is tracked by pid, never by object identity, so it survives a
/// deep copy even though every record object is new.
#[derive(Default)]
pub struct Snapshot {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Arc<ProcessRecord>>,
    selected_pid: Option<u32>,
    generation: u64,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock_inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_inner().entries.is_empty()
    }

    pub fn selected_pid(&self) -> Option<u32> {
        self.lock_inner().selected_pid
    }

    /// Bumped on every structural change; lets a consumer skip redundant
    /// copies of data it has already seen.
    pub fn generation(&self) -> u64 {
        self.lock_inner().generation
    }

    /// A consistent view of the entry list. The returned handles stay valid
    /// after the container lock is dropped; field reads go through each
    /// record's own lock.
    pub fn entries(&self) -> Vec<Arc<ProcessRecord>> {
        self.lock_inner().entries.clone()
    }

    pub fn add_entry(&self, record: Arc<ProcessRecord>) {
        let mut inner = self.lock_inner();
        debug_assert!(
            !inner.entries.iter().any(|r| r.pid() == record.pid()),
            "duplicate pid {} added to snapshot",
            record.pid()
        );
        inner.entries.push(record);
        inner.generation += 1;
    }

    pub fn find_entry(&self, pid: u32) -> Option<Arc<ProcessRecord>> {
        self.lock_inner()
            .entries
            .iter()
            .find(|r| r.pid() == pid)
            .cloned()
    }

    /// Selection with an explicit tie-break: selecting the already selected
    /// pid keeps it when `preserve` is set and toggles it off otherwise.
    /// Passing `None` or a pid not in the container clears the selection.
    pub fn select_entry(&self, pid: Option<u32>, preserve: bool) {
        let mut inner = self.lock_inner();
        select_locked(&mut inner, pid, preserve);
    }

    /// Remove the record with the given pid. The position is found by an
    /// explicit scan over pids; a removed record that was selected leaves the
    /// snapshot with no selection.
    pub fn erase_entry(&self, pid: u32) -> bool {
        let mut inner = self.lock_inner();
        let Some(index) = inner.entries.iter().position(|r| r.pid() == pid) else {
            return false;
        };
        let record = inner.entries.remove(index);
        if inner.selected_pid == Some(pid) {
            record.deselect();
            inner.selected_pid = None;
        }
        inner.generation += 1;
        true
    }

    /// Deep copy of `source` into `self`: every record is duplicated, then
    /// selection is re-applied by pid. The destination's prior selection wins;
    /// a destination with no selection inherits the source's.
    ///
    /// Both container locks are taken in address order, so two concurrent
    /// copies in opposite directions cannot deadlock.
    pub fn copy_from(&self, source: &Snapshot) {
        if std::ptr::eq(self, source) {
            return;
        }

        let self_first = (self as *const Snapshot as usize) < (source as *const Snapshot as usize);
        let (mut dest, src) = if self_first {
            let dest = self.lock_inner();
            let src = source.lock_inner();
            (dest, src)
        } else {
            let src = source.lock_inner();
            let dest = self.lock_inner();
            (dest, src)
        };

        let restore_pid = dest.selected_pid.or(src.selected_pid);
        dest.entries = src
            .entries
            .iter()
            .map(|record| Arc::new(record.duplicate()))
            .collect();
        dest.selected_pid = None;
        dest.generation += 1;
        select_locked(&mut dest, restore_pid, true);
    }

    /// Publish half of a polling cycle: replace the entry list with the
    /// registry's current records (same objects, so unchanged processes keep
    /// their identity) in pid order. A selection whose process vanished is
    /// cleared.
    pub fn sync_with(&self, registry: &ProcessRegistry) {
        let mut inner = self.lock_inner();
        let mut entries: Vec<Arc<ProcessRecord>> = registry.records().cloned().collect();
        entries.sort_unstable_by_key(|r| r.pid());
        inner.entries = entries;
        inner.generation += 1;
        if let Some(pid) = inner.selected_pid
            && !inner.entries.iter().any(|r| r.pid() == pid)
        {
            inner.selected_pid = None;
        }
    }
}

fn select_locked(inner: &mut Inner, pid: Option<u32>, preserve: bool) {
    let target = pid.and_then(|p| inner.entries.iter().find(|r| r.pid() == p).cloned());
    let current = inner.selected_pid;

    match target {
        None => {
            // Explicit clear, or the pid is not present: either way any
            // existing selection is dropped.
            if let Some(current_pid) = current
                && let Some(record) = inner.entries.iter().find(|r| r.pid() == current_pid)
            {
                record.deselect();
            }
            inner.selected_pid = None;
        }
        Some(record) => {
            if current == Some(record.pid()) {
                if preserve {
                    record.select();
                } else {
                    record.deselect();
                    inner.selected_pid = None;
                }
                return;
            }
            if let Some(current_pid) = current
                && let Some(previous) = inner.entries.iter().find(|r| r.pid() == current_pid)
            {
                previous.deselect();
            }
            record.select();
            inner.selected_pid = Some(record.pid());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::source::ProcessRow;

    fn row(pid: u32) -> ProcessRow {
        ProcessRow {
            pid,
            parent_pid: Some(0),
            module_id: None,
            memory_usage: 1024 * u64::from(pid),
            thread_count: Some(1),
            priority_class: None,
            name: format!("proc_{pid}"),
        }
    }

    fn snapshot_with(pids: &[u32]) -> Snapshot {
        let snapshot = Snapshot::new();
        for &pid in pids {
            snapshot.add_entry(Arc::new(ProcessRecord::from_row(&row(pid))));
        }
        snapshot
    }

    #[test]
    fn add_and_find() {
        let snapshot = snapshot_with(&[100, 200]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.find_entry(200).map(|r| r.pid()), Some(200));
        assert!(snapshot.find_entry(300).is_none());
    }

    #[test]
    fn select_toggle_semantics() {
        let snapshot = snapshot_with(&[100, 200]);

        snapshot.select_entry(Some(100), true);
        assert_eq!(snapshot.selected_pid(), Some(100));
        assert!(snapshot.find_entry(100).is_some_and(|r| r.is_selected()));

        // Idempotent re-select.
        snapshot.select_entry(Some(100), true);
        assert_eq!(snapshot.selected_pid(), Some(100));

        // Toggle off.
        snapshot.select_entry(Some(100), false);
        assert_eq!(snapshot.selected_pid(), None);
        assert!(snapshot.find_entry(100).is_some_and(|r| !r.is_selected()));
    }

    #[test]
    fn selecting_other_pid_moves_selection() {
        let snapshot = snapshot_with(&[100, 200]);
        snapshot.select_entry(Some(100), true);
        snapshot.select_entry(Some(200), true);

        assert_eq!(snapshot.selected_pid(), Some(200));
        assert!(snapshot.find_entry(100).is_some_and(|r| !r.is_selected()));
        assert!(snapshot.find_entry(200).is_some_and(|r| r.is_selected()));
    }

    #[test]
    fn selecting_missing_pid_clears_selection() {
        let snapshot = snapshot_with(&[100]);
        snapshot.select_entry(Some(100), true);
        snapshot.select_entry(Some(9999), true);
        assert_eq!(snapshot.selected_pid(), None);
        assert!(snapshot.find_entry(100).is_some_and(|r| !r.is_selected()));
    }

    #[test]
    fn select_none_clears() {
        let snapshot = snapshot_with(&[100]);
        snapshot.select_entry(Some(100), true);
        snapshot.select_entry(None, true);
        assert_eq!(snapshot.selected_pid(), None);
    }

    #[test]
    fn erase_clears_selection_of_erased_pid() {
        let snapshot = snapshot_with(&[100, 200]);
        snapshot.select_entry(Some(100), true);

        assert!(snapshot.erase_entry(100));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.selected_pid(), None);
        assert!(!snapshot.erase_entry(100));
    }

    #[test]
    fn copy_preserves_destination_selection_by_pid() {
        let source = snapshot_with(&[100, 200, 300]);
        let dest = snapshot_with(&[100, 999]);
        dest.select_entry(Some(100), true);

        dest.copy_from(&source);

        assert_eq!(dest.len(), 3);
        assert_eq!(dest.selected_pid(), Some(100));
        assert!(dest.find_entry(100).is_some_and(|r| r.is_selected()));
        // Deep copy: the record objects are new.
        let src_record = source.find_entry(100).expect("source lost pid 100");
        let dest_record = dest.find_entry(100).expect("copy lost pid 100");
        assert!(!Arc::ptr_eq(&src_record, &dest_record));
    }

    #[test]
    fn fresh_copy_inherits_source_selection() {
        let source = snapshot_with(&[100, 200]);
        source.select_entry(Some(100), true);

        let dest = Snapshot::new();
        dest.copy_from(&source);

        assert_eq!(dest.selected_pid(), Some(100));
        assert!(dest.find_entry(100).is_some_and(|r| r.is_selected()));
    }

    #[test]
    fn copy_drops_selection_when_pid_gone_from_source() {
        let source = snapshot_with(&[200, 300]);
        let dest = snapshot_with(&[100]);
        dest.select_entry(Some(100), true);

        dest.copy_from(&source);

        assert_eq!(dest.len(), 2);
        assert_eq!(dest.selected_pid(), None);
    }

    #[test]
    fn sync_with_registry_keeps_selection_and_orders_by_pid() {
        use crate::system::registry::ProcessRegistry;

        let snapshot = snapshot_with(&[300, 100]);
        snapshot.select_entry(Some(100), true);

        let mut registry = ProcessRegistry::new();
        // Same pid 100 object as the snapshot holds, plus a new pid 200.
        let existing = snapshot.find_entry(100).expect("pid 100 missing");
        registry.insert(existing);
        registry.insert(Arc::new(ProcessRecord::from_row(&row(200))));

        snapshot.sync_with(&registry);

        let pids: Vec<u32> = snapshot.entries().iter().map(|r| r.pid()).collect();
        assert_eq!(pids, vec![100, 200]);
        assert_eq!(snapshot.selected_pid(), Some(100));

        // pid 100 exits; the selection goes with it.
        registry.remove(100);
        snapshot.sync_with(&registry);
        assert_eq!(snapshot.selected_pid(), None);
    }

    #[test]
    fn generation_bumps_on_structural_change() {
        let snapshot = Snapshot::new();
        let before = snapshot.generation();
        snapshot.add_entry(Arc::new(ProcessRecord::from_row(&row(1))));
        assert!(snapshot.generation() > before);

        let mid = snapshot.generation();
        snapshot.erase_entry(1);
        assert!(snapshot.generation() > mid);
    }
}
