//! Windows termination primitives.
//!
//! - `TerminateProcess` (through `sysinfo`) for the direct OS call
//! - `taskkill /PID xxx /F /T` for the command-based fallback

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::KillError;

#[derive(Debug, Default)]
pub struct WindowsTerminator;

impl WindowsTerminator {
    pub fn new() -> Self {
        Self
    }

    /// Open the process and call `TerminateProcess` on it.
    pub fn direct_terminate(&self, pid: u32) -> Result<(), KillError> {
        debug!(pid = pid, "Calling TerminateProcess");

        let target = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing(),
        );

        let process = system
            .process(target)
            .ok_or(KillError::ProcessNotFound(pid))?;

        if process.kill() {
            Ok(())
        } else {
            Err(KillError::TerminationFailed(
                pid,
                "TerminateProcess was refused".to_string(),
            ))
        }
    }

    /// Terminate the process and its children using taskkill /F /T.
    pub async fn force_kill_command(&self, pid: u32) -> Result<(), KillError> {
        debug!(pid = pid, "Executing taskkill /F /T");

        let output = Command::new("taskkill")
            .arg("/PID")
            .arg(pid.to_string())
            .arg("/F")
            .arg("/T")
            .output()
            .await?;

        if output.status.success() {
            debug!(pid = pid, "taskkill succeeded");
            return Ok(());
        }

        // Check stderr and stdout for common error conditions
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let combined = format!("{} {}", stdout, stderr);

        if combined.contains("not found") || combined.contains("could not be found") {
            debug!(pid = pid, "Process not found");
            return Err(KillError::ProcessNotFound(pid));
        }

        if combined.contains("Access is denied") || combined.contains("access denied") {
            warn!(pid = pid, "Access denied to kill process");
            return Err(KillError::PermissionDenied(pid));
        }

        // "The process has already been terminated" is also a success
        if combined.contains("already been terminated") || combined.contains("has exited") {
            debug!(pid = pid, "Process already terminated");
            return Ok(());
        }

        Err(KillError::CommandFailed(format!(
            "taskkill /PID {} /F /T failed: {}",
            pid,
            combined.trim()
        )))
    }
}
