//! Process matching application service.

use crate::domain::{MatchPattern, ProcessHandle};
use crate::ports::ProcessTablePort;

/// Filter a process table snapshot down to the matched set.
///
/// Excludes processes observed as exited and the reaper itself. The result is
/// sorted by PID.
pub fn filter_matching(
    snapshot: Vec<ProcessHandle>,
    pattern: &MatchPattern,
    own_pid: u32,
) -> Vec<ProcessHandle> {
    let mut matched: Vec<ProcessHandle> = snapshot
        .into_iter()
        .filter(|p| p.pid != own_pid && !p.exited && pattern.matches(&p.exe))
        .collect();
    matched.sort_by_key(|p| p.pid);
    matched
}

/// Application service returning the current matched set.
///
/// Holds no state between calls: every `find_matching` re-reads the live
/// process table through the `ProcessTablePort`.
pub struct ProcessMatcher<T: ProcessTablePort> {
    table: T,
    pattern: MatchPattern,
    own_pid: u32,
}

impl<T: ProcessTablePort> ProcessMatcher<T> {
    /// Create a matcher for `pattern` over the given process table.
    pub fn new(table: T, pattern: MatchPattern) -> Self {
        Self {
            table,
            pattern,
            own_pid: std::process::id(),
        }
    }

    /// Override the PID treated as the reaper itself.
    pub fn with_own_pid(mut self, own_pid: u32) -> Self {
        self.own_pid = own_pid;
        self
    }

    /// The pattern processes are matched against.
    pub fn pattern(&self) -> &MatchPattern {
        &self.pattern
    }

    /// Query the live process table and return the matching processes.
    pub async fn find_matching(&self) -> Vec<ProcessHandle> {
        let snapshot = self.table.snapshot().await;
        filter_matching(snapshot, &self.pattern, self.own_pid)
    }
}
