//! Reaper Core Library
//!
//! Detection and escalating termination of orphaned build processes on
//! shared CI machines. Provides functionality to:
//! - Find live processes whose executable lives in the build output tree
//! - Terminate them with two independent, increasingly forceful primitives
//! - Sweep stale temporary and cache artifacts under service accounts
//! - Map the final state to a pass/fail exit status
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure data models and rules
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: Operating system implementations
//! - `application`: Use case services
//!
//! # Platform Support
//! - Unix: `kill(2)` then `/bin/kill -KILL`
//! - Windows: `TerminateProcess` then `taskkill /F /T`

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;

// Re-export domain types (primary API)
pub use domain::{
    CleanupOutcome, MatchPattern, ProcessHandle, RunReport, ServiceIdentityClassifier,
    SweepReport, TerminationAttempt, TerminationStrategy, WaitBudget,
};

// Re-export other commonly used types
pub use adapters::{PlatformTerminator, SystemProcessTable};
pub use application::{
    CacheSweeper, EscalatingTerminator, OutcomeReporter, ProcessMatcher, SweepTargets,
};
pub use config::{ConfigStore, ReaperConfig};
pub use error::{Error, KillError, Result};
