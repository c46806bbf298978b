//! Reaper configuration.
//!
//! Stored in JSON format at `<config_dir>/build-reaper/config.json`. Every
//! field is optional; missing fields take the operational defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::application::{SweepOptions, DEFAULT_ARCHIVE_PATTERN};
use crate::domain::{
    MatchPattern, ServiceIdentityClassifier, WaitBudget, DEFAULT_SERVICE_IDENTITY_PATTERN,
};
use crate::error::{Error, Result};

/// Configuration data stored in JSON format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaperConfig {
    /// Polls per wait window.
    #[serde(default = "default_wait_tries")]
    pub wait_tries: u32,

    /// Delay before each poll, in milliseconds.
    #[serde(default = "default_wait_interval_ms")]
    pub wait_interval_ms: u64,

    /// Name of the build output directory under the workspace root.
    #[serde(default = "default_build_dir_name")]
    pub build_dir_name: String,

    /// Regex classifying service accounts.
    #[serde(default = "default_service_identity_pattern")]
    pub service_identity_pattern: String,

    /// Regex selecting setup archives in the temp directory.
    #[serde(default = "default_archive_pattern")]
    pub archive_pattern: String,

    /// Age after which HTTP cache entries are removed, in hours.
    #[serde(default = "default_cache_max_age_hours")]
    pub cache_max_age_hours: u64,
}

fn default_wait_tries() -> u32 {
    WaitBudget::DEFAULT_TRIES
}

fn default_wait_interval_ms() -> u64 {
    WaitBudget::DEFAULT_INTERVAL.as_millis() as u64
}

fn default_build_dir_name() -> String {
    MatchPattern::DEFAULT_BUILD_DIR_NAME.to_string()
}

fn default_service_identity_pattern() -> String {
    DEFAULT_SERVICE_IDENTITY_PATTERN.to_string()
}

fn default_archive_pattern() -> String {
    DEFAULT_ARCHIVE_PATTERN.to_string()
}

fn default_cache_max_age_hours() -> u64 {
    24
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            wait_tries: default_wait_tries(),
            wait_interval_ms: default_wait_interval_ms(),
            build_dir_name: default_build_dir_name(),
            service_identity_pattern: default_service_identity_pattern(),
            archive_pattern: default_archive_pattern(),
            cache_max_age_hours: default_cache_max_age_hours(),
        }
    }
}

impl ReaperConfig {
    /// Reject values that would make the run unbounded or meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.wait_tries == 0 {
            return Err(Error::Config("waitTries must be at least 1".to_string()));
        }
        let name = self.build_dir_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "buildDirName must be a single path component, got {:?}",
                self.build_dir_name
            )));
        }
        Regex::new(&self.service_identity_pattern)?;
        Regex::new(&self.archive_pattern)?;
        Ok(())
    }

    /// Wait budget applied after each termination attempt.
    pub fn wait_budget(&self) -> WaitBudget {
        WaitBudget::new(self.wait_tries, Duration::from_millis(self.wait_interval_ms))
    }

    /// Match pattern for an optional workspace root.
    pub fn match_pattern(&self, workspace_root: Option<&Path>) -> MatchPattern {
        MatchPattern::for_workspace(workspace_root, &self.build_dir_name)
    }

    pub fn classifier(&self) -> Result<ServiceIdentityClassifier> {
        Ok(ServiceIdentityClassifier::new(&self.service_identity_pattern)?)
    }

    pub fn sweep_options(&self, dry_run: bool) -> Result<SweepOptions> {
        Ok(SweepOptions {
            archive_pattern: Regex::new(&self.archive_pattern)?,
            cache_max_age: Duration::from_secs(self.cache_max_age_hours * 60 * 60),
            dry_run,
        })
    }
}

/// Configuration store for reading reaper settings.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `<config_dir>/build-reaper/config.json`
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        Ok(Self {
            config_path: config_dir.join("build-reaper").join("config.json"),
        })
    }

    /// Create a config store with a custom path.
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist. A file that exists
    /// but cannot be read or parsed is an error.
    pub async fn load(&self) -> Result<ReaperConfig> {
        if !self.config_path.exists() {
            return Ok(ReaperConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        let config: ReaperConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }
}
