//! Process terminator port (interface).

use crate::domain::{ProcessHandle, TerminationStrategy};
use crate::error::KillError;

/// Port for issuing termination requests.
///
/// Implementations provide one primitive per `TerminationStrategy`. A request
/// is fire-and-forget: success means the request was accepted by the OS, not
/// that the process is gone.
pub trait ProcessTerminatorPort: Send + Sync {
    /// Issue a termination request for one process using `strategy`.
    fn terminate(
        &self,
        process: &ProcessHandle,
        strategy: TerminationStrategy,
    ) -> impl std::future::Future<Output = Result<(), KillError>> + Send;
}
