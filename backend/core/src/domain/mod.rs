//! Domain layer - Pure data models and rules.
//!
//! This module contains domain entities that represent core reaper concepts.
//! These types have no I/O dependencies and can be tested in isolation.

mod identity;
mod process;
mod sweep;
mod termination;

// Re-export all domain types
pub use identity::{ServiceIdentityClassifier, DEFAULT_SERVICE_IDENTITY_PATTERN};
pub use process::{MatchPattern, ProcessHandle};
pub use sweep::{SweepReport, SweepStats};
pub use termination::{
    AttemptOutcome, CleanupOutcome, RunReport, TerminationAttempt, TerminationStrategy,
    WaitBudget,
};
