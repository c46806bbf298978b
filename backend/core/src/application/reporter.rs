//! Outcome reporting and exit status mapping.

use tracing::{error, info, warn};

use crate::domain::{CleanupOutcome, RunReport};
use crate::error::Result;

/// Exit status for `AllStopped`.
pub const EXIT_ALL_STOPPED: u8 = 0;
/// Exit status for `ResidualProcesses`.
pub const EXIT_RESIDUAL: u8 = 1;

/// Map an outcome to the process exit status.
pub fn exit_code(outcome: &CleanupOutcome) -> u8 {
    match outcome {
        CleanupOutcome::AllStopped => EXIT_ALL_STOPPED,
        CleanupOutcome::ResidualProcesses(_) => EXIT_RESIDUAL,
    }
}

/// Logs the final state of a run and decides the exit status.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutcomeReporter;

impl OutcomeReporter {
    pub fn new() -> Self {
        Self
    }

    /// Emit the final outcome and return the exit status.
    ///
    /// On failure every residual process is listed with its PID and path,
    /// since the orchestrator must surface them instead of tearing down the
    /// workspace.
    pub fn report(&self, report: &RunReport) -> u8 {
        if let Some(sweep) = &report.sweep {
            info!(
                removed = sweep.total_removed(),
                bytes = sweep.total_bytes(),
                failures = sweep.total_failures(),
                "Cache sweep summary"
            );
        }

        match &report.outcome {
            CleanupOutcome::AllStopped if report.was_fast_path() => {
                info!(pattern = %report.pattern, "Success: no matching processes were running");
            }
            CleanupOutcome::AllStopped => {
                info!(
                    pattern = %report.pattern,
                    terminated = report.initial.len(),
                    attempts = report.attempts.len(),
                    polls = report.total_polls(),
                    "Success: all matching processes stopped"
                );
            }
            CleanupOutcome::ResidualProcesses(residual) => {
                error!(
                    pattern = %report.pattern,
                    count = residual.len(),
                    attempts = report.attempts.len(),
                    "Failure: processes survived every termination attempt"
                );
                for process in residual {
                    warn!(
                        pid = process.pid,
                        path = %process.exe.display(),
                        "Residual process"
                    );
                }
            }
        }

        exit_code(&report.outcome)
    }

    /// Render the run report as pretty-printed JSON.
    pub fn to_json(&self, report: &RunReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MatchPattern, ProcessHandle, SweepReport};

    fn report(outcome: CleanupOutcome) -> RunReport {
        RunReport {
            pattern: MatchPattern::for_workspace(None, "build"),
            initial: outcome.residual().to_vec(),
            attempts: Vec::new(),
            outcome,
            sweep: None,
        }
    }

    #[test]
    fn test_exit_codes() {
        let reporter = OutcomeReporter::new();
        assert_eq!(reporter.report(&report(CleanupOutcome::AllStopped)), 0);

        let residual =
            CleanupOutcome::ResidualProcesses(vec![ProcessHandle::new(300, "/w/build/x", "x")]);
        assert_ne!(reporter.report(&report(residual)), 0);
    }

    #[test]
    fn test_sweep_does_not_affect_exit_code() {
        let mut run = report(CleanupOutcome::AllStopped);
        run.sweep = Some(SweepReport {
            setup_archives: crate::domain::SweepStats {
                failures: 3,
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(OutcomeReporter::new().report(&run), EXIT_ALL_STOPPED);
    }

    #[test]
    fn test_json_lists_residual_processes() {
        let residual =
            CleanupOutcome::ResidualProcesses(vec![ProcessHandle::new(300, "/w/build/x", "x")]);
        let json = OutcomeReporter::new().to_json(&report(residual)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["outcome"]["status"], "residualProcesses");
        assert_eq!(value["outcome"]["residual"][0]["pid"], 300);
        assert_eq!(value["pattern"]["kind"], "generic");
        assert!(value.get("sweep").is_none());
    }
}
