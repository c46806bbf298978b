//! Process terminator adapters.
//!
//! Each platform provides two independent termination primitives, one per
//! `TerminationStrategy`:
//! - Unix: `kill(2)` with SIGKILL, then `/bin/kill -KILL`
//! - Windows: `TerminateProcess`, then `taskkill /F /T`

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

use crate::domain::{ProcessHandle, TerminationStrategy};
use crate::error::KillError;
use crate::ports::ProcessTerminatorPort;

/// The main terminator that uses platform-specific implementations.
pub struct PlatformTerminator {
    #[cfg(unix)]
    inner: unix::UnixTerminator,

    #[cfg(windows)]
    inner: windows::WindowsTerminator,
}

impl PlatformTerminator {
    /// Create a new terminator for the current platform.
    pub fn new() -> Self {
        Self {
            #[cfg(unix)]
            inner: unix::UnixTerminator::new(),

            #[cfg(windows)]
            inner: windows::WindowsTerminator::new(),
        }
    }
}

impl Default for PlatformTerminator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTerminatorPort for PlatformTerminator {
    async fn terminate(
        &self,
        process: &ProcessHandle,
        strategy: TerminationStrategy,
    ) -> Result<(), KillError> {
        match strategy {
            TerminationStrategy::DirectTerminate => self.inner.direct_terminate(process.pid),
            TerminationStrategy::ForceKillCommand => self.inner.force_kill_command(process.pid).await,
        }
    }
}
