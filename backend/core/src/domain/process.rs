//! Process and match-pattern domain models.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ============================================================================
// ProcessHandle
// ============================================================================

/// A live OS process observed at one point in time.
///
/// Handles are created fresh on every query of the process table and are
/// never carried across wait cycles: a pid seen one poll ago may already
/// belong to an unrelated process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessHandle {
    /// OS-assigned process ID. Reused over time.
    pub pid: u32,
    /// Resolved main executable path.
    pub exe: PathBuf,
    /// Human-readable module name (e.g. `clang++.exe`).
    pub name: String,
    /// Whether the process looked exited (zombie/dead) when observed.
    #[serde(default)]
    pub exited: bool,
}

impl ProcessHandle {
    /// Create a handle for a running process.
    pub fn new(pid: u32, exe: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            pid,
            exe: exe.into(),
            name: name.into(),
            exited: false,
        }
    }

    /// Mark the handle as observed exited.
    pub fn exited(mut self) -> Self {
        self.exited = true;
        self
    }
}

impl std::fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (PID: {}, Path: {})", self.name, self.pid, self.exe.display())
    }
}

// ============================================================================
// MatchPattern
// ============================================================================

/// Rule selecting which processes are in scope for the reaper.
///
/// The workspace-anchored form is preferred whenever a workspace root is
/// known. The generic form only matches executables living below a directory
/// component named like the build output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MatchPattern {
    /// Executables strictly below `<workspace-root>/<build-dir-name>`.
    Workspace { build_dir: PathBuf },
    /// Executables below any directory component named `build_dir_name`.
    Generic { build_dir_name: String },
}

impl MatchPattern {
    /// Default name of the build output directory.
    pub const DEFAULT_BUILD_DIR_NAME: &'static str = "build";

    /// Build the pattern for an optional workspace root.
    pub fn for_workspace(workspace_root: Option<&Path>, build_dir_name: &str) -> Self {
        match workspace_root {
            Some(root) => MatchPattern::Workspace {
                build_dir: root.join(build_dir_name),
            },
            None => MatchPattern::Generic {
                build_dir_name: build_dir_name.to_string(),
            },
        }
    }

    /// Whether this pattern is anchored on a workspace root.
    pub fn is_anchored(&self) -> bool {
        matches!(self, MatchPattern::Workspace { .. })
    }

    /// Check if an executable path falls inside the build output tree.
    pub fn matches(&self, exe: &Path) -> bool {
        let exe = normalize(exe);
        match self {
            MatchPattern::Workspace { build_dir } => {
                let prefix = normalize(build_dir);
                if prefix.is_empty() {
                    return false;
                }
                exe.len() > prefix.len() + 1
                    && exe.starts_with(&prefix)
                    && exe.as_bytes()[prefix.len()] == b'/'
            }
            MatchPattern::Generic { build_dir_name } => {
                let name = fold_case(build_dir_name);
                let components: Vec<&str> = exe.split('/').collect();
                match components.split_last() {
                    Some((file, dirs)) if !file.is_empty() => {
                        dirs.iter().any(|dir| *dir == name)
                    }
                    _ => false,
                }
            }
        }
    }
}

impl std::fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPattern::Workspace { build_dir } => {
                write!(f, "{}/*", normalize(build_dir))
            }
            MatchPattern::Generic { build_dir_name } => write!(f, "*/{}/*", build_dir_name),
        }
    }
}

/// Unify separators and case so that paths compare the way the OS does.
fn normalize(path: &Path) -> String {
    let unified = path.to_string_lossy().replace('\\', "/");
    fold_case(unified.trim_end_matches('/'))
}

fn fold_case(s: &str) -> String {
    if cfg!(windows) {
        s.to_lowercase()
    } else {
        s.to_string()
    }
}
