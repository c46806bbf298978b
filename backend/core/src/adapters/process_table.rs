//! Process table adapter backed by `sysinfo`.

use std::path::Path;

use parking_lot::Mutex;
use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

use crate::domain::ProcessHandle;
use crate::ports::ProcessTablePort;

/// Live view of the OS process table.
///
/// The underlying `System` is refreshed on every snapshot with dead entries
/// removed, so nothing observed by a previous snapshot leaks into the next.
pub struct SystemProcessTable {
    system: Mutex<System>,
}

impl SystemProcessTable {
    /// Create a new process table reader.
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing().with_exe(UpdateKind::Always)
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTablePort for SystemProcessTable {
    async fn snapshot(&self) -> Vec<ProcessHandle> {
        let mut system = self.system.lock();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, Self::refresh_kind());

        let mut unresolved = 0usize;
        let mut threads = 0usize;
        let mut handles = Vec::with_capacity(system.processes().len());
        for (pid, process) in system.processes() {
            // Linux tasks share the owning process's exe and are killed with it
            if process.thread_kind().is_some() {
                threads += 1;
                continue;
            }

            // Permission denied or exited mid-query
            let Some(exe) = process.exe().filter(|p| !p.as_os_str().is_empty()) else {
                unresolved += 1;
                continue;
            };

            let mut handle = ProcessHandle::new(
                pid.as_u32(),
                exe,
                module_name(exe, &process.name().to_string_lossy()),
            );
            if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
                handle = handle.exited();
            }
            handles.push(handle);
        }

        debug!(
            resolved = handles.len(),
            unresolved = unresolved,
            threads = threads,
            "Process table snapshot taken"
        );
        handles
    }
}

/// Prefer the executable's file name; fall back to the name the OS reports.
fn module_name(exe: &Path, reported: &str) -> String {
    exe.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| reported.to_string())
}
