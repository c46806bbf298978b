//! Adapters layer - Operating system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.
//! Each adapter handles communication with the OS process-control interfaces.

pub mod process_table;
pub mod terminator;

// Re-export main types for convenience
pub use process_table::SystemProcessTable;
pub use terminator::PlatformTerminator;
