//! Error types for the reaper-core library.

use thiserror::Error;

/// Result type alias for reaper operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reaping processes or sweeping caches.
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid regular expression in configuration.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors returned by a single termination request.
#[derive(Error, Debug)]
pub enum KillError {
    /// The specified process was not found
    #[error("Process with PID {0} not found")]
    ProcessNotFound(u32),

    /// Permission denied to kill the process
    #[error("Permission denied to kill process {0}")]
    PermissionDenied(u32),

    /// Failed to execute the kill command
    #[error("Failed to execute kill command: {0}")]
    CommandFailed(String),

    /// The OS refused to terminate the process
    #[error("Failed to terminate process {0}: {1}")]
    TerminationFailed(u32, String),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
