//! Termination strategies, attempts and run outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{MatchPattern, ProcessHandle, SweepReport};

// ============================================================================
// TerminationStrategy
// ============================================================================

/// A termination primitive. Variants are ordered by escalating force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationStrategy {
    /// Direct OS process-control call (`kill(2)` with SIGKILL / `TerminateProcess`).
    DirectTerminate,
    /// The system kill utility (`kill -KILL` / `taskkill /F /T`).
    ForceKillCommand,
}

impl TerminationStrategy {
    /// The escalation ladder, in the order it is climbed.
    pub const LADDER: [TerminationStrategy; 2] = [
        TerminationStrategy::DirectTerminate,
        TerminationStrategy::ForceKillCommand,
    ];

    /// Get the display name for this strategy.
    pub fn display_name(&self) -> &'static str {
        match self {
            TerminationStrategy::DirectTerminate => "direct terminate",
            TerminationStrategy::ForceKillCommand => "force-kill command",
        }
    }
}

impl std::fmt::Display for TerminationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// WaitBudget
// ============================================================================

/// Bounded wait-and-recheck window following a termination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitBudget {
    /// Maximum number of polls.
    pub tries: u32,
    /// Delay before each poll.
    #[serde(with = "duration_ms")]
    pub interval: Duration,
}

impl WaitBudget {
    pub const DEFAULT_TRIES: u32 = 5;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(tries: u32, interval: Duration) -> Self {
        Self { tries, interval }
    }

    /// Upper bound on the time spent waiting in this window.
    pub fn total(&self) -> Duration {
        self.interval * self.tries
    }
}

impl Default for WaitBudget {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TRIES, Self::DEFAULT_INTERVAL)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

// ============================================================================
// TerminationAttempt
// ============================================================================

/// How the wait window of an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AttemptOutcome {
    /// The matched set was observed empty.
    AllStopped,
    /// The try budget ran out with processes still matching.
    Remaining { count: usize },
}

/// One pass of the escalation ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationAttempt {
    pub strategy: TerminationStrategy,
    /// Size of the matched set when the attempt started.
    pub target_count: usize,
    /// PIDs a termination request was issued for.
    pub targeted_pids: Vec<u32>,
    /// Requests that returned an error.
    pub failed_requests: usize,
    pub budget: WaitBudget,
    /// Polls actually performed (at most `budget.tries`).
    pub polls: u32,
    pub outcome: AttemptOutcome,
}

impl TerminationAttempt {
    /// Whether the wait window ended with an empty matched set.
    pub fn stopped_all(&self) -> bool {
        self.outcome == AttemptOutcome::AllStopped
    }
}

// ============================================================================
// CleanupOutcome
// ============================================================================

/// Terminal result of a run. The only state the invoker observes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "residual", rename_all = "camelCase")]
pub enum CleanupOutcome {
    /// No matching process remains.
    AllStopped,
    /// Processes still alive after every escalation level.
    ResidualProcesses(Vec<ProcessHandle>),
}

impl CleanupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CleanupOutcome::AllStopped)
    }

    /// Residual processes, empty on success.
    pub fn residual(&self) -> &[ProcessHandle] {
        match self {
            CleanupOutcome::AllStopped => &[],
            CleanupOutcome::ResidualProcesses(list) => list,
        }
    }
}

// ============================================================================
// RunReport
// ============================================================================

/// Summary of one reaper invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub pattern: MatchPattern,
    /// Matched set observed before any attempt.
    pub initial: Vec<ProcessHandle>,
    pub attempts: Vec<TerminationAttempt>,
    pub outcome: CleanupOutcome,
    /// Present only when the cache sweep ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepReport>,
}

impl RunReport {
    /// Total number of wait polls across all attempts.
    pub fn total_polls(&self) -> u32 {
        self.attempts.iter().map(|a| a.polls).sum()
    }

    /// Whether the run short-circuited on an empty initial matched set.
    pub fn was_fast_path(&self) -> bool {
        self.initial.is_empty() && self.attempts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_escalates() {
        let ladder = TerminationStrategy::LADDER;
        assert!(ladder.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ladder[0], TerminationStrategy::DirectTerminate);
    }

    #[test]
    fn test_wait_budget_default() {
        let budget = WaitBudget::default();
        assert_eq!(budget.tries, 5);
        assert_eq!(budget.total(), Duration::from_secs(5));
    }

    #[test]
    fn test_outcome_residual() {
        assert!(CleanupOutcome::AllStopped.is_success());
        assert!(CleanupOutcome::AllStopped.residual().is_empty());

        let outcome =
            CleanupOutcome::ResidualProcesses(vec![ProcessHandle::new(300, "/ws/build/x", "x")]);
        assert!(!outcome.is_success());
        assert_eq!(outcome.residual()[0].pid, 300);
    }

    #[test]
    fn test_report_serializes_budget_in_millis() {
        let attempt = TerminationAttempt {
            strategy: TerminationStrategy::DirectTerminate,
            target_count: 1,
            targeted_pids: vec![7],
            failed_requests: 0,
            budget: WaitBudget::new(3, Duration::from_millis(250)),
            polls: 1,
            outcome: AttemptOutcome::AllStopped,
        };
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["budget"]["interval"], 250);
        assert_eq!(json["strategy"], "directTerminate");
        assert_eq!(json["outcome"]["state"], "allStopped");
    }
}
