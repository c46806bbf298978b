//! Application layer - Use case services.
//!
//! This module contains application services that orchestrate
//! domain logic and adapter interactions.
//!
//! Services are designed to be thin orchestrators that:
//! - Accept domain types as inputs
//! - Use ports (traits) for the process table and termination primitives
//! - Return domain types as outputs

mod matcher;
mod reporter;
mod sweeper;
mod terminator;

pub use matcher::{filter_matching, ProcessMatcher};
pub use reporter::{exit_code, OutcomeReporter, EXIT_ALL_STOPPED, EXIT_RESIDUAL};
pub use sweeper::{
    CacheSweeper, FsRemover, Remover, SweepOptions, SweepTargets, DEFAULT_ARCHIVE_PATTERN,
    DEFAULT_CACHE_MAX_AGE,
};
pub use terminator::EscalatingTerminator;
