use std::collections::HashMap;
use std::sync::Arc;

use super::record::ProcessRecord;

/// Pid-keyed bookkeeping used inside one polling cycle to detect new, changed,
/// and vanished processes without reallocating unchanged records.
///
/// Owned and touched by the sampling worker thread only; it is never shared,
/// so it carries no lock of its own.
#[derive(Default)]
pub struct ProcessRegistry {
    records: HashMap<u32, Arc<ProcessRecord>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, pid: u32) -> Option<&Arc<ProcessRecord>> {
        self.records.get(&pid)
    }

    pub fn insert(&mut self, record: Arc<ProcessRecord>) {
        self.records.insert(record.pid(), record);
    }

    pub fn remove(&mut self, pid: u32) -> Option<Arc<ProcessRecord>> {
        self.records.remove(&pid)
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<ProcessRecord>> {
        self.records.values()
    }

    /// Drop every record the current cycle did not mark seen (the process
    /// exited). Returns the removed pids.
    pub fn sweep_unseen(&mut self) -> Vec<u32> {
        let vanished: Vec<u32> = self
            .records
            .values()
            .filter(|record| !record.is_seen())
            .map(|record| record.pid())
            .collect();
        for pid in &vanished {
            self.records.remove(pid);
        }
        vanished
    }

    /// Reset liveness flags ahead of the next enumeration pass.
    pub fn clear_seen(&mut self) {
        for record in self.records.values() {
            record.clear_seen();
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
            memory_usage: 1024,
            thread_count: Some(1),
            priority_class: None,
            name: format!("proc_{pid}"),
        }
    }

    #[test]
    fn insert_and_lookup() {
        let mut registry = ProcessRegistry::new();
        registry.insert(Arc::new(ProcessRecord::from_row(&row(10))));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(10).map(|r| r.pid()), Some(10));
        assert!(registry.get(11).is_none());
    }

    #[test]
    fn sweep_removes_only_unseen() {
        let mut registry = ProcessRegistry::new();
        registry.insert(Arc::new(ProcessRecord::from_row(&row(1))));
        registry.insert(Arc::new(ProcessRecord::from_row(&row(2))));
        registry.insert(Arc::new(ProcessRecord::from_row(&row(3))));

        registry.clear_seen();
        // Next cycle re-enumerates 1 and 3 but not 2.
        for pid in [1, 3] {
            if let Some(record) = registry.get(pid) {
                record.mark_seen();
            }
        }

        let mut vanished = registry.sweep_unseen();
        vanished.sort_unstable();
        assert_eq!(vanished, vec![2]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get(2).is_none());
    }

    #[test]
    fn clear_seen_resets_every_record() {
        let mut registry = ProcessRegistry::new();
        registry.insert(Arc::new(ProcessRecord::from_row(&row(1))));
        registry.insert(Arc::new(ProcessRecord::from_row(&row(2))));

        registry.clear_seen();
        assert!(registry.records().all(|r| !r.is_seen()));
    }
}
