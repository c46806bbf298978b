//! Unix termination primitives.
//!
//! - `kill(2)` with SIGKILL for the direct OS call
//! - `/bin/kill -KILL PID` for the command-based fallback

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::KillError;

#[derive(Debug, Default)]
pub struct UnixTerminator;

impl UnixTerminator {
    pub fn new() -> Self {
        Self
    }

    /// Send SIGKILL straight through the syscall interface.
    pub fn direct_terminate(&self, pid: u32) -> Result<(), KillError> {
        let raw = to_raw_pid(pid)?;
        debug!(pid = pid, "Sending SIGKILL via kill(2)");

        match kill(Pid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(KillError::ProcessNotFound(pid)),
            Err(Errno::EPERM) => {
                warn!(pid = pid, "Permission denied to kill process");
                Err(KillError::PermissionDenied(pid))
            }
            Err(e) => Err(KillError::TerminationFailed(pid, e.to_string())),
        }
    }

    /// Run the system kill utility with SIGKILL.
    pub async fn force_kill_command(&self, pid: u32) -> Result<(), KillError> {
        to_raw_pid(pid)?;
        debug!(pid = pid, "Running /bin/kill -KILL");

        let output = Command::new("/bin/kill")
            .arg("-KILL")
            .arg(pid.to_string())
            .output()
            .await?;

        if output.status.success() {
            debug!(pid = pid, "kill command succeeded");
            return Ok(());
        }

        // Check stderr for common error conditions
        let stderr = String::from_utf8_lossy(&output.stderr);

        if stderr.contains("No such process") {
            debug!(pid = pid, "Process not found");
            return Err(KillError::ProcessNotFound(pid));
        }

        if stderr.contains("Operation not permitted") || stderr.contains("Permission denied") {
            warn!(pid = pid, "Permission denied to kill process");
            return Err(KillError::PermissionDenied(pid));
        }

        Err(KillError::CommandFailed(format!(
            "kill -KILL {} failed: {}",
            pid,
            stderr.trim()
        )))
    }
}

/// PIDs 0 and anything that wraps to a negative value address process
/// groups in `kill(2)`, never a single process.
fn to_raw_pid(pid: u32) -> Result<i32, KillError> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(raw),
        _ => Err(KillError::TerminationFailed(pid, "invalid pid".to_string())),
    }
}
