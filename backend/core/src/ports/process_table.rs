//! Process table port (interface).

use crate::domain::ProcessHandle;

/// Port for reading the live OS process table.
///
/// Every call must observe the table afresh. Processes whose executable path
/// cannot be resolved are left out rather than failing the whole query.
pub trait ProcessTablePort: Send + Sync {
    /// Take a snapshot of all processes with a resolved executable path.
    fn snapshot(&self) -> impl std::future::Future<Output = Vec<ProcessHandle>> + Send;
}
