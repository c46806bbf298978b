//! Auxiliary cache sweep.
//!
//! Best-effort removal of stale artifacts left behind by previous jobs. Every
//! action has its own error boundary: failures are logged, counted and
//! skipped. Nothing here can influence the termination outcome.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::domain::{ServiceIdentityClassifier, SweepReport, SweepStats};

/// Default pattern for single-use setup archives in the temp directory.
pub const DEFAULT_ARCHIVE_PATTERN: &str = r"(?i)^(setup|install)[^/\\]*\.(zip|7z|tar\.gz|tgz)$";

/// Default age after which package-manager HTTP cache entries are removed.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Locations the sweep operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepTargets {
    /// Per-user package-manager configuration file.
    pub user_config: Option<PathBuf>,
    /// OS temp directory (archives and GUID-named directories).
    pub temp_dir: PathBuf,
    /// Package-manager HTTP cache directory.
    pub http_cache: Option<PathBuf>,
}

impl SweepTargets {
    /// Resolve the default locations for the current user and platform.
    pub fn from_environment() -> Self {
        let config_file = if cfg!(windows) { "pip.ini" } else { "pip.conf" };
        let http_cache = if cfg!(windows) {
            dirs::cache_dir().map(|d| d.join("pip").join("cache").join("http-v2"))
        } else {
            dirs::cache_dir().map(|d| d.join("pip").join("http-v2"))
        };

        Self {
            user_config: dirs::config_dir().map(|d| d.join("pip").join(config_file)),
            temp_dir: std::env::temp_dir(),
            http_cache,
        }
    }
}

/// Tunables for the sweep.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub archive_pattern: Regex,
    pub cache_max_age: Duration,
    /// Log what would be removed without removing it.
    pub dry_run: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            archive_pattern: Regex::new(DEFAULT_ARCHIVE_PATTERN)
                .expect("default archive pattern is valid"),
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            dry_run: false,
        }
    }
}

/// Filesystem removal operations used by the sweep.
pub trait Remover {
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// `Remover` backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRemover;

impl Remover for FsRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}

/// Best-effort cleanup of stale temporary and cache artifacts.
pub struct CacheSweeper<R: Remover = FsRemover> {
    targets: SweepTargets,
    options: SweepOptions,
    remover: R,
    now: SystemTime,
}

impl CacheSweeper<FsRemover> {
    pub fn new(targets: SweepTargets, options: SweepOptions) -> Self {
        Self {
            targets,
            options,
            remover: FsRemover,
            now: SystemTime::now(),
        }
    }
}

impl<R: Remover> CacheSweeper<R> {
    /// Use a different removal backend.
    pub fn with_remover<R2: Remover>(self, remover: R2) -> CacheSweeper<R2> {
        CacheSweeper {
            targets: self.targets,
            options: self.options,
            remover,
            now: self.now,
        }
    }

    /// Override the reference time used for cache ages.
    pub fn with_now(mut self, now: SystemTime) -> Self {
        self.now = now;
        self
    }

    /// Run the sweep only when `identity` is a service account.
    ///
    /// Returns `None` when the sweep was skipped.
    pub fn sweep_if_service(
        &self,
        classifier: &ServiceIdentityClassifier,
        identity: &str,
    ) -> Option<SweepReport> {
        if !classifier.is_service_identity(identity) {
            info!(identity = identity, "Interactive account, skipping cache sweep");
            return None;
        }

        info!(identity = identity, "Service account, running cache sweep");
        Some(self.sweep())
    }

    /// Run every sweep action in order.
    pub fn sweep(&self) -> SweepReport {
        let report = SweepReport {
            dry_run: self.options.dry_run,
            user_config: self.sweep_user_config(),
            setup_archives: self.sweep_setup_archives(),
            guid_dirs: self.sweep_guid_dirs(),
            http_cache: self.sweep_http_cache(),
        };

        info!(
            removed = report.total_removed(),
            bytes = report.total_bytes(),
            failures = report.total_failures(),
            dry_run = report.dry_run,
            "Cache sweep finished"
        );
        report
    }

    fn sweep_user_config(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        let Some(path) = self.targets.user_config.as_deref() else {
            return stats;
        };
        if !path.is_file() {
            debug!(path = %path.display(), "No user package-manager config");
            return stats;
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                info!(path = %path.display(), "Removing user package-manager config:");
                for line in contents.lines() {
                    info!("  {}", line);
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Could not read config"),
        }

        self.remove_file(path, &mut stats);
        info!(removed = stats.files_removed, "User config sweep done");
        stats
    }

    fn sweep_setup_archives(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        for path in self.list_temp_dir() {
            let is_archive = path
                .file_name()
                .map(|n| self.options.archive_pattern.is_match(&n.to_string_lossy()))
                .unwrap_or(false);
            if is_archive && path.is_file() {
                self.remove_file(&path, &mut stats);
            }
        }

        info!(
            files = stats.files_removed,
            bytes = stats.bytes_reclaimed,
            failures = stats.failures,
            "Setup archive sweep done"
        );
        stats
    }

    fn sweep_guid_dirs(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        for path in self.list_temp_dir() {
            let is_guid = path
                .file_name()
                .map(|n| is_guid_name(&n.to_string_lossy()))
                .unwrap_or(false);
            if is_guid && path.is_dir() && is_empty_dir(&path) {
                self.remove_dir(&path, &mut stats);
            }
        }

        info!(
            dirs = stats.dirs_removed,
            failures = stats.failures,
            "Empty GUID directory sweep done"
        );
        stats
    }

    fn sweep_http_cache(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        let Some(root) = self.targets.http_cache.as_deref() else {
            return stats;
        };
        if !root.is_dir() {
            debug!(path = %root.display(), "No package-manager HTTP cache");
            return stats;
        }

        // Contents first: a directory is visited after everything inside it,
        // so it can be removed once its stale files are gone. In a dry run
        // nothing disappears, so removals are tracked to judge emptiness.
        let mut gone = HashSet::new();
        for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    stats.failures += 1;
                    warn!(error = %e, "Could not walk HTTP cache entry");
                    continue;
                }
            };

            let path = entry.path();
            let removed = if entry.file_type().is_dir() {
                is_empty_after(path, &gone) && self.remove_dir(path, &mut stats)
            } else {
                self.is_stale(&entry) && self.remove_file(path, &mut stats)
            };
            if removed {
                gone.insert(path.to_path_buf());
            }
        }

        info!(
            files = stats.files_removed,
            dirs = stats.dirs_removed,
            bytes = stats.bytes_reclaimed,
            failures = stats.failures,
            max_age_hours = self.options.cache_max_age.as_secs() / 3600,
            "HTTP cache sweep done"
        );
        stats
    }

    fn is_stale(&self, entry: &walkdir::DirEntry) -> bool {
        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        match modified.map(|m| self.now.duration_since(m)) {
            Some(Ok(age)) => age > self.options.cache_max_age,
            // Modified in the future or unknown
            _ => false,
        }
    }

    fn list_temp_dir(&self) -> Vec<PathBuf> {
        match fs::read_dir(&self.targets.temp_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(e) => {
                warn!(
                    path = %self.targets.temp_dir.display(),
                    error = %e,
                    "Could not list temp directory"
                );
                Vec::new()
            }
        }
    }

    /// Remove (or, in a dry run, count) a file. True if it is gone afterwards.
    fn remove_file(&self, path: &Path, stats: &mut SweepStats) -> bool {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if self.options.dry_run {
            info!(path = %path.display(), bytes = size, "Would remove file");
            stats.files_removed += 1;
            stats.bytes_reclaimed += size;
            return true;
        }

        match self.remover.remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), bytes = size, "Removed file");
                stats.files_removed += 1;
                stats.bytes_reclaimed += size;
                true
            }
            Err(e) => {
                stats.failures += 1;
                warn!(path = %path.display(), error = %e, "Could not remove file");
                false
            }
        }
    }

    fn remove_dir(&self, path: &Path, stats: &mut SweepStats) -> bool {
        if self.options.dry_run {
            info!(path = %path.display(), "Would remove directory");
            stats.dirs_removed += 1;
            return true;
        }

        match self.remover.remove_dir(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed directory");
                stats.dirs_removed += 1;
                true
            }
            Err(e) => {
                stats.failures += 1;
                warn!(path = %path.display(), error = %e, "Could not remove directory");
                false
            }
        }
    }
}

/// Hyphenated GUID, optionally wrapped in braces.
fn is_guid_name(name: &str) -> bool {
    let inner = name
        .strip_prefix('{')
        .and_then(|n| n.strip_suffix('}'))
        .unwrap_or(name);
    inner.len() == 36 && Uuid::try_parse(inner).is_ok()
}

fn is_empty_dir(path: &Path) -> bool {
    is_empty_after(path, &HashSet::new())
}

/// True if every child of `path` is in `gone`. Unreadable dirs are not empty.
fn is_empty_after(path: &Path, gone: &HashSet<PathBuf>) -> bool {
    let Ok(entries) = fs::read_dir(path) else {
        return false;
    };
    entries
        .map(|e| e.map(|e| gone.contains(&e.path())))
        .all(|left| matches!(left, Ok(true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    const GUID: &str = "6f1c2b1e-8d1a-4c3e-9b7a-0e2f4d5c6b7a";
    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    struct Fixture {
        _dir: TempDir,
        targets: SweepTargets,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let temp_dir = root.join("tmp");
        let cache = root.join("cache").join("http-v2");
        fs::create_dir_all(&temp_dir).unwrap();
        fs::create_dir_all(cache.join("a").join("b")).unwrap();
        fs::create_dir_all(root.join("config")).unwrap();

        let config = root.join("config").join("pip.conf");
        fs::write(&config, "[global]\nindex-url = https://mirror.invalid/simple\n").unwrap();

        fs::write(temp_dir.join("setup-rocm.zip"), b"archive").unwrap();
        fs::write(temp_dir.join("Install_tools.tar.gz"), b"archive").unwrap();
        fs::write(temp_dir.join("notes.zip"), b"keep").unwrap();
        fs::create_dir(temp_dir.join(GUID)).unwrap();
        fs::create_dir(temp_dir.join(format!("{{{}}}", GUID.to_uppercase()))).unwrap();
        fs::create_dir(temp_dir.join("0e2f4d5c-busy-dir")).unwrap();
        let busy_guid = temp_dir.join("11111111-2222-3333-4444-555555555555");
        fs::create_dir(&busy_guid).unwrap();
        fs::write(busy_guid.join("lock"), b"").unwrap();

        fs::write(cache.join("a").join("b").join("entry"), b"0123456789").unwrap();
        fs::write(cache.join("top"), b"0123").unwrap();

        Fixture {
            targets: SweepTargets {
                user_config: Some(config),
                temp_dir,
                http_cache: Some(cache),
            },
            _dir: dir,
        }
    }

    /// Remover that refuses to delete selected file names.
    struct DenyRemover {
        denied: HashSet<String>,
    }

    impl Remover for DenyRemover {
        fn remove_file(&self, path: &Path) -> io::Result<()> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if self.denied.contains(&name) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            fs::remove_file(path)
        }

        fn remove_dir(&self, path: &Path) -> io::Result<()> {
            fs::remove_dir(path)
        }
    }

    #[test]
    fn test_is_guid_name() {
        assert!(is_guid_name(GUID));
        assert!(is_guid_name(&format!("{{{}}}", GUID)));
        assert!(!is_guid_name("6f1c2b1e8d1a4c3e9b7a0e2f4d5c6b7a"));
        assert!(!is_guid_name("not-a-guid"));
        assert!(!is_guid_name(&format!("{{{}", GUID)));
    }

    #[test]
    fn test_sweep_removes_stale_artifacts() {
        let fx = fixture();
        let report = CacheSweeper::new(fx.targets.clone(), SweepOptions::default())
            .with_now(SystemTime::now() + 2 * DAY)
            .sweep();

        assert_eq!(report.user_config.files_removed, 1);
        assert!(!fx.targets.user_config.as_ref().unwrap().exists());

        assert_eq!(report.setup_archives.files_removed, 2);
        assert!(fx.targets.temp_dir.join("notes.zip").exists());

        assert_eq!(report.guid_dirs.dirs_removed, 2);
        assert!(fx
            .targets
            .temp_dir
            .join("11111111-2222-3333-4444-555555555555")
            .exists());
        assert!(fx.targets.temp_dir.join("0e2f4d5c-busy-dir").exists());

        let cache = fx.targets.http_cache.as_ref().unwrap();
        assert_eq!(report.http_cache.files_removed, 2);
        assert_eq!(report.http_cache.bytes_reclaimed, 14);
        // a/b then a, deepest first
        assert_eq!(report.http_cache.dirs_removed, 2);
        assert!(cache.exists());
        assert!(!cache.join("a").exists());
        assert_eq!(report.total_failures(), 0);
    }

    #[test]
    fn test_fresh_cache_entries_are_kept() {
        let fx = fixture();
        let report = CacheSweeper::new(fx.targets.clone(), SweepOptions::default()).sweep();

        let cache = fx.targets.http_cache.as_ref().unwrap();
        assert_eq!(report.http_cache.files_removed, 0);
        assert_eq!(report.http_cache.dirs_removed, 0);
        assert!(cache.join("a").join("b").join("entry").exists());
    }

    #[test]
    fn test_failures_are_counted_not_propagated() {
        let fx = fixture();
        let remover = DenyRemover {
            denied: ["setup-rocm.zip", "entry"].iter().map(|s| s.to_string()).collect(),
        };
        let report = CacheSweeper::new(fx.targets.clone(), SweepOptions::default())
            .with_remover(remover)
            .with_now(SystemTime::now() + 2 * DAY)
            .sweep();

        assert_eq!(report.setup_archives.failures, 1);
        assert_eq!(report.setup_archives.files_removed, 1);
        assert_eq!(report.http_cache.failures, 1);
        assert_eq!(report.http_cache.files_removed, 1);
        // a/b still holds the undeletable entry, so neither directory goes
        assert_eq!(report.http_cache.dirs_removed, 0);
        // Later actions still ran
        assert_eq!(report.guid_dirs.dirs_removed, 2);
        assert_eq!(report.total_failures(), 2);
    }

    #[test]
    fn test_dry_run_removes_nothing() {
        let fx = fixture();
        let options = SweepOptions {
            dry_run: true,
            ..SweepOptions::default()
        };
        let report = CacheSweeper::new(fx.targets.clone(), options).sweep();

        assert!(report.dry_run);
        assert_eq!(report.setup_archives.files_removed, 2);
        assert!(fx.targets.temp_dir.join("setup-rocm.zip").exists());
        assert!(fx.targets.user_config.as_ref().unwrap().exists());
    }

    #[test]
    fn test_dry_run_counts_directories_a_real_run_would_remove() {
        let fx = fixture();
        let options = SweepOptions {
            dry_run: true,
            ..SweepOptions::default()
        };
        let later = SystemTime::now() + 2 * DAY;
        let dry = CacheSweeper::new(fx.targets.clone(), options)
            .with_now(later)
            .sweep();

        let cache = fx.targets.http_cache.as_ref().unwrap();
        assert_eq!(dry.http_cache.files_removed, 2);
        assert_eq!(dry.http_cache.dirs_removed, 2);
        assert!(cache.join("a").join("b").join("entry").exists());
        assert!(cache.join("top").exists());

        let real = CacheSweeper::new(fx.targets.clone(), SweepOptions::default())
            .with_now(later)
            .sweep();
        assert_eq!(real.http_cache, dry.http_cache);
        assert!(!cache.join("a").exists());
    }

    #[test]
    fn test_interactive_identity_skips_sweep() {
        let fx = fixture();
        let classifier = ServiceIdentityClassifier::default();
        let sweeper = CacheSweeper::new(fx.targets.clone(), SweepOptions::default())
            .with_now(SystemTime::now() + 2 * DAY);

        assert!(sweeper.sweep_if_service(&classifier, "CORP\\alice").is_none());
        assert!(fx.targets.user_config.as_ref().unwrap().exists());
        assert!(fx.targets.temp_dir.join("setup-rocm.zip").exists());
        assert!(fx.targets.temp_dir.join(GUID).exists());

        let report = sweeper.sweep_if_service(&classifier, "NT AUTHORITY\\SYSTEM");
        assert!(report.unwrap().total_removed() > 0);
    }

    #[test]
    fn test_missing_targets_are_not_errors() {
        let dir = tempdir().unwrap();
        let targets = SweepTargets {
            user_config: None,
            temp_dir: dir.path().join("missing"),
            http_cache: Some(dir.path().join("nope")),
        };
        let report = CacheSweeper::new(targets, SweepOptions::default()).sweep();
        assert_eq!(report.total_removed(), 0);
        assert_eq!(report.total_failures(), 0);
    }
}
