use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use thiserror::Error;

use super::platform;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("process enumeration failed: {0}")]
    Enumeration(String),
}

/// One row of the OS process table. Fields the OS may withhold (e.g. on
/// access-denied for privileged processes) are optional; a partial row is
/// still a valid row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub pid: u32,
    pub parent_pid: Option<u32>,
    pub module_id: Option<u32>,
    pub memory_usage: u64,
    pub thread_count: Option<u32>,
    pub priority_class: Option<i32>,
    pub name: String,
}

/// Produces, on demand, a finite sequence of process rows.
///
/// Implementations are driven from the sampling worker thread only.
pub trait ProcessSource: Send {
    fn enumerate(&mut self) -> Result<Vec<ProcessRow>, SourceError>;
}

/// Process source backed by the `sysinfo` crate, supplemented with per-OS
/// reads for fields sysinfo does not expose (priority, thread count).
pub struct SysinfoSource {
    sys: System,
    include_kernel_threads: bool,
}

impl SysinfoSource {
    pub fn new(include_kernel_threads: bool) -> Self {
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        SysinfoSource {
            sys,
            include_kernel_threads,
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ProcessSource for SysinfoSource {
    fn enumerate(&mut self) -> Result<Vec<ProcessRow>, SourceError> {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );

        if self.sys.processes().is_empty() {
            return Err(SourceError::Enumeration(
                "OS returned an empty process table".to_string(),
            ));
        }

        let mut rows = Vec::with_capacity(self.sys.processes().len());
        for (pid, process) in self.sys.processes() {
            // Kernel threads carry no command line and no resident memory.
            if !self.include_kernel_threads
                && process.cmd().is_empty()
                && process.memory() == 0
            {
                continue;
            }

            let pid_u32 = pid.as_u32();
            rows.push(ProcessRow {
                pid: pid_u32,
                parent_pid: process.parent().map(|p| p.as_u32()),
                // sysinfo exposes no module id; the session id is the nearest
                // stable group identifier.
                module_id: process.session_id().map(|s| s.as_u32()),
                memory_usage: process.memory(),
                thread_count: platform::process_thread_count(pid_u32),
                priority_class: platform::process_priority(pid_u32),
                name: process.name().to_string_lossy().to_string(),
            });
        }

        Ok(rows)
    }
}
