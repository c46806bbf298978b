//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with the operating system. Implementations live in `adapters`.

mod process_table;
mod terminator;

pub use process_table::ProcessTablePort;
pub use terminator::ProcessTerminatorPort;
