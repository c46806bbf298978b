//! Escalating termination of the matched set.
//!
//! The run climbs `TerminationStrategy::LADDER` one rung at a time:
//!
//! ```text
//! Idle -> Attempt1 -> Wait1 -> Attempt2 -> Wait2 -> Final
//! ```
//!
//! Every step works on a freshly queried matched set. PIDs are never carried
//! from one query to the next, since the OS may have handed them to an
//! unrelated process in between.

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::{
    AttemptOutcome, CleanupOutcome, ProcessHandle, RunReport, TerminationAttempt,
    TerminationStrategy, WaitBudget,
};
use crate::error::KillError;
use crate::ports::{ProcessTablePort, ProcessTerminatorPort};

use super::ProcessMatcher;

/// Drives the matched set to empty with increasing force, or reports that it
/// cannot.
pub struct EscalatingTerminator<T: ProcessTablePort, K: ProcessTerminatorPort> {
    matcher: ProcessMatcher<T>,
    killer: K,
    budgets: [WaitBudget; 2],
}

impl<T: ProcessTablePort, K: ProcessTerminatorPort> EscalatingTerminator<T, K> {
    /// Create a terminator using the same wait budget after every attempt.
    pub fn new(matcher: ProcessMatcher<T>, killer: K, budget: WaitBudget) -> Self {
        Self {
            matcher,
            killer,
            budgets: [budget; 2],
        }
    }

    /// Use a separate wait budget for each rung of the ladder.
    pub fn with_budgets(mut self, first: WaitBudget, second: WaitBudget) -> Self {
        self.budgets = [first, second];
        self
    }

    /// Run the whole termination protocol once.
    pub async fn run(&self) -> RunReport {
        let pattern = self.matcher.pattern().clone();
        let initial = self.matcher.find_matching().await;

        if initial.is_empty() {
            info!(pattern = %pattern, "No matching processes, nothing to clean up");
            return RunReport {
                pattern,
                initial,
                attempts: Vec::new(),
                outcome: CleanupOutcome::AllStopped,
                sweep: None,
            };
        }

        info!(
            pattern = %pattern,
            count = initial.len(),
            "Found processes holding the build tree"
        );
        log_processes(&initial, "Matched process");

        let mut attempts = Vec::with_capacity(TerminationStrategy::LADDER.len());
        let mut targets = initial.clone();

        for (level, (strategy, budget)) in TerminationStrategy::LADDER
            .into_iter()
            .zip(self.budgets)
            .enumerate()
        {
            if level > 0 {
                targets = self.matcher.find_matching().await;
                if targets.is_empty() {
                    info!(strategy = %strategy, "Matched set emptied before escalation");
                    return RunReport {
                        pattern,
                        initial,
                        attempts,
                        outcome: CleanupOutcome::AllStopped,
                        sweep: None,
                    };
                }
            }

            let attempt = self.attempt(strategy, &targets, budget).await;
            let stopped = attempt.stopped_all();
            attempts.push(attempt);

            if stopped {
                return RunReport {
                    pattern,
                    initial,
                    attempts,
                    outcome: CleanupOutcome::AllStopped,
                    sweep: None,
                };
            }
        }

        let residual = self.matcher.find_matching().await;
        let outcome = if residual.is_empty() {
            CleanupOutcome::AllStopped
        } else {
            CleanupOutcome::ResidualProcesses(residual)
        };

        RunReport {
            pattern,
            initial,
            attempts,
            outcome,
            sweep: None,
        }
    }

    /// Issue one strategy against every target, then wait for the set to drain.
    async fn attempt(
        &self,
        strategy: TerminationStrategy,
        targets: &[ProcessHandle],
        budget: WaitBudget,
    ) -> TerminationAttempt {
        info!(
            strategy = %strategy,
            count = targets.len(),
            "Terminating matched processes"
        );

        let mut failed_requests = 0;
        for process in targets {
            match self.killer.terminate(process, strategy).await {
                Ok(()) => {
                    info!(pid = process.pid, path = %process.exe.display(), "Termination requested");
                }
                Err(KillError::ProcessNotFound(_)) => {
                    debug!(pid = process.pid, "Process already gone");
                }
                Err(e) => {
                    failed_requests += 1;
                    warn!(
                        pid = process.pid,
                        path = %process.exe.display(),
                        error = %e,
                        "Termination request failed"
                    );
                }
            }
        }

        let (polls, outcome) = self.wait(strategy, budget).await;

        TerminationAttempt {
            strategy,
            target_count: targets.len(),
            targeted_pids: targets.iter().map(|p| p.pid).collect(),
            failed_requests,
            budget,
            polls,
            outcome,
        }
    }

    /// Poll the matched set until it is empty or the try budget runs out.
    async fn wait(&self, strategy: TerminationStrategy, budget: WaitBudget) -> (u32, AttemptOutcome) {
        let mut remaining = 0;

        for poll in 1..=budget.tries {
            sleep(budget.interval).await;

            let current = self.matcher.find_matching().await;
            if current.is_empty() {
                info!(strategy = %strategy, poll = poll, "All matched processes stopped");
                return (poll, AttemptOutcome::AllStopped);
            }

            remaining = current.len();
            info!(
                strategy = %strategy,
                poll = poll,
                tries = budget.tries,
                remaining = remaining,
                "Waiting for processes to exit"
            );
            log_processes(&current, "Still running");
        }

        warn!(
            strategy = %strategy,
            remaining = remaining,
            waited_ms = budget.total().as_millis() as u64,
            "Wait budget exhausted"
        );
        (budget.tries, AttemptOutcome::Remaining { count: remaining })
    }
}

fn log_processes(processes: &[ProcessHandle], message: &str) {
    for process in processes {
        info!(
            pid = process.pid,
            name = %process.name,
            path = %process.exe.display(),
            "{}",
            message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchPattern;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashSet};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    const TRIES: u32 = 5;

    /// A simulated process: which strategies it shrugs off.
    #[derive(Clone)]
    struct SimProcess {
        handle: ProcessHandle,
        resists: HashSet<TerminationStrategy>,
    }

    #[derive(Default)]
    struct SimState {
        processes: BTreeMap<u32, SimProcess>,
        /// Unrelated process that takes over a PID once it is freed.
        reuse: BTreeMap<u32, ProcessHandle>,
        queries: usize,
        kills: Vec<(u32, TerminationStrategy)>,
        failing: HashSet<u32>,
    }

    #[derive(Clone, Default)]
    struct Sim {
        state: Arc<Mutex<SimState>>,
    }

    impl Sim {
        fn spawn(&self, pid: u32, resists: &[TerminationStrategy]) {
            let handle = ProcessHandle::new(pid, format!("/ws/build/bin/tool{}", pid), "tool");
            self.state.lock().processes.insert(
                pid,
                SimProcess {
                    handle,
                    resists: resists.iter().copied().collect(),
                },
            );
        }

        fn queries(&self) -> usize {
            self.state.lock().queries
        }

        fn kills(&self) -> Vec<(u32, TerminationStrategy)> {
            self.state.lock().kills.clone()
        }
    }

    impl ProcessTablePort for Sim {
        async fn snapshot(&self) -> Vec<ProcessHandle> {
            let mut state = self.state.lock();
            state.queries += 1;
            state.processes.values().map(|p| p.handle.clone()).collect()
        }
    }

    impl ProcessTerminatorPort for Sim {
        async fn terminate(
            &self,
            process: &ProcessHandle,
            strategy: TerminationStrategy,
        ) -> Result<(), KillError> {
            let mut state = self.state.lock();
            state.kills.push((process.pid, strategy));

            if state.failing.contains(&process.pid) {
                return Err(KillError::PermissionDenied(process.pid));
            }

            let Some(sim) = state.processes.get(&process.pid).cloned() else {
                return Err(KillError::ProcessNotFound(process.pid));
            };
            if sim.resists.contains(&strategy) {
                return Ok(());
            }

            state.processes.remove(&process.pid);
            if let Some(successor) = state.reuse.remove(&process.pid) {
                state.processes.insert(
                    process.pid,
                    SimProcess {
                        handle: successor,
                        resists: HashSet::new(),
                    },
                );
            }
            Ok(())
        }
    }

    fn terminator(sim: &Sim) -> EscalatingTerminator<Sim, Sim> {
        let matcher = ProcessMatcher::new(
            sim.clone(),
            MatchPattern::for_workspace(Some(Path::new("/ws")), "build"),
        )
        .with_own_pid(1);
        EscalatingTerminator::new(matcher, sim.clone(), WaitBudget::new(TRIES, Duration::ZERO))
    }

    use crate::domain::TerminationStrategy::{DirectTerminate, ForceKillCommand};

    #[tokio::test]
    async fn test_empty_initial_set_is_fast_path() {
        let sim = Sim::default();
        let report = terminator(&sim).run().await;

        assert_eq!(report.outcome, CleanupOutcome::AllStopped);
        assert!(report.was_fast_path());
        assert!(sim.kills().is_empty());
        assert_eq!(sim.queries(), 1);
    }

    #[tokio::test]
    async fn test_escalation_is_lazy() {
        let sim = Sim::default();
        sim.spawn(100, &[]);
        sim.spawn(101, &[]);

        let report = terminator(&sim).run().await;

        assert_eq!(report.outcome, CleanupOutcome::AllStopped);
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].polls, 1);
        assert!(sim.kills().iter().all(|(_, s)| *s == DirectTerminate));
    }

    #[tokio::test]
    async fn test_second_strategy_once_per_survivor() {
        let sim = Sim::default();
        sim.spawn(100, &[]);
        sim.spawn(200, &[DirectTerminate]);

        let report = terminator(&sim).run().await;

        assert_eq!(report.outcome, CleanupOutcome::AllStopped);
        assert_eq!(report.attempts.len(), 2);

        let first = &report.attempts[0];
        assert_eq!(first.strategy, DirectTerminate);
        assert_eq!(first.targeted_pids, vec![100, 200]);
        assert_eq!(first.polls, TRIES);
        assert_eq!(first.outcome, AttemptOutcome::Remaining { count: 1 });

        let second = &report.attempts[1];
        assert_eq!(second.strategy, ForceKillCommand);
        assert_eq!(second.targeted_pids, vec![200]);
        assert_eq!(second.polls, 1);
        assert!(second.stopped_all());

        assert_eq!(
            sim.kills(),
            vec![
                (100, DirectTerminate),
                (200, DirectTerminate),
                (200, ForceKillCommand)
            ]
        );
    }

    #[tokio::test]
    async fn test_resistant_process_is_residual() {
        let sim = Sim::default();
        sim.spawn(300, &[DirectTerminate, ForceKillCommand]);

        let report = terminator(&sim).run().await;

        match &report.outcome {
            CleanupOutcome::ResidualProcesses(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].pid, 300);
            }
            other => panic!("Unexpected outcome: {:?}", other),
        }
        assert_eq!(report.total_polls(), TRIES * 2);
        // initial + wait1 + re-query + wait2 + final
        assert_eq!(sim.queries(), 1 + TRIES as usize + 1 + TRIES as usize + 1);
        assert_eq!(
            sim.kills(),
            vec![(300, DirectTerminate), (300, ForceKillCommand)]
        );
    }

    #[tokio::test]
    async fn test_reused_pid_is_not_a_target() {
        let sim = Sim::default();
        sim.spawn(100, &[]);
        sim.spawn(200, &[DirectTerminate]);
        sim.state
            .lock()
            .reuse
            .insert(100, ProcessHandle::new(100, "/usr/sbin/sshd", "sshd"));

        let report = terminator(&sim).run().await;

        assert_eq!(report.outcome, CleanupOutcome::AllStopped);
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::Remaining { count: 1 });
        assert_eq!(report.attempts[1].targeted_pids, vec![200]);
        assert!(!sim.kills().contains(&(100, ForceKillCommand)));
    }

    #[tokio::test]
    async fn test_failed_request_does_not_stop_others() {
        let sim = Sim::default();
        sim.spawn(100, &[]);
        sim.spawn(200, &[]);
        sim.state.lock().failing.insert(100);

        let report = terminator(&sim).run().await;

        assert_eq!(report.attempts[0].failed_requests, 1);
        assert!(sim.kills().contains(&(200, DirectTerminate)));
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::Remaining { count: 1 });
        assert!(!report.outcome.is_success());
        assert_eq!(report.outcome.residual()[0].pid, 100);
    }

    #[tokio::test]
    async fn test_per_level_budgets() {
        let sim = Sim::default();
        sim.spawn(300, &[DirectTerminate, ForceKillCommand]);

        let report = terminator(&sim)
            .with_budgets(
                WaitBudget::new(2, Duration::ZERO),
                WaitBudget::new(3, Duration::ZERO),
            )
            .run()
            .await;

        assert_eq!(report.attempts[0].polls, 2);
        assert_eq!(report.attempts[1].polls, 3);
        assert_eq!(sim.queries(), 1 + 2 + 1 + 3 + 1);
    }
}
