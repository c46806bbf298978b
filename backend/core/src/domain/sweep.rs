//! Cache sweep result model.

use serde::{Deserialize, Serialize};

/// Counters for one sweep action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepStats {
    pub files_removed: usize,
    pub dirs_removed: usize,
    pub bytes_reclaimed: u64,
    pub failures: usize,
}

impl SweepStats {
    pub fn removed(&self) -> usize {
        self.files_removed + self.dirs_removed
    }
}

/// Result of an auxiliary cache sweep. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Whether deletions were only logged.
    pub dry_run: bool,
    pub user_config: SweepStats,
    pub setup_archives: SweepStats,
    pub guid_dirs: SweepStats,
    pub http_cache: SweepStats,
}

impl SweepReport {
    pub fn total_removed(&self) -> usize {
        self.actions().iter().map(|s| s.removed()).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.actions().iter().map(|s| s.failures).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.actions().iter().map(|s| s.bytes_reclaimed).sum()
    }

    fn actions(&self) -> [&SweepStats; 4] {
        [
            &self.user_config,
            &self.setup_archives,
            &self.guid_dirs,
            &self.http_cache,
        ]
    }
}
