//! Reap command - terminate matched processes, sweep caches, report.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reaper_core::{
    CacheSweeper, ConfigStore, EscalatingTerminator, OutcomeReporter, PlatformTerminator,
    ProcessMatcher, ReaperConfig, SweepTargets, SystemProcessTable,
};
use tracing::{info, warn};

use crate::Cli;

pub async fn run(cli: Cli) -> Result<u8> {
    let config = load_config(&cli).await?;
    let workspace_root = resolve_workspace_root(cli.workspace_root.as_deref())?;
    let identity = cli.identity.clone().unwrap_or_else(current_identity);

    let classifier = config.classifier()?;
    let is_service = classifier.is_service_identity(&identity);
    info!(
        identity = %identity,
        service_account = is_service,
        "Privilege classification"
    );

    let pattern = config.match_pattern(workspace_root.as_deref());
    let budget = config.wait_budget();
    info!(
        pattern = %pattern,
        tries = budget.tries,
        interval_ms = budget.interval.as_millis() as u64,
        "Starting orphaned process cleanup"
    );

    let matcher = ProcessMatcher::new(SystemProcessTable::new(), pattern);
    let terminator = EscalatingTerminator::new(matcher, PlatformTerminator::new(), budget);
    let mut report = terminator.run().await;

    if cli.skip_sweep {
        info!("Cache sweep disabled");
    } else {
        let sweeper = CacheSweeper::new(
            SweepTargets::from_environment(),
            config.sweep_options(cli.dry_run)?,
        );
        report.sweep = sweeper.sweep_if_service(&classifier, &identity);
    }

    let reporter = OutcomeReporter::new();
    let code = reporter.report(&report);

    if cli.json {
        println!("{}", reporter.to_json(&report)?);
    }

    Ok(code)
}

async fn load_config(cli: &Cli) -> Result<ReaperConfig> {
    let store = match &cli.config {
        Some(path) => ConfigStore::with_path(path.clone()),
        None => ConfigStore::new()?,
    };

    let mut config = store
        .load()
        .await
        .with_context(|| format!("loading {}", store.path().display()))?;

    if let Some(tries) = cli.wait_tries {
        config.wait_tries = tries;
    }
    if let Some(interval) = cli.wait_interval_ms {
        config.wait_interval_ms = interval;
    }
    if let Some(name) = &cli.build_dir_name {
        config.build_dir_name = name.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Missing or empty roots fall back to the generic pattern.
///
/// The root is canonicalized because the OS reports executables by their
/// resolved path; a root reached through a symlink would otherwise match
/// nothing.
fn resolve_workspace_root(root: Option<&Path>) -> Result<Option<PathBuf>> {
    let Some(root) = root.filter(|r| !r.as_os_str().is_empty()) else {
        info!("No workspace root provided, falling back to the generic build-tree pattern");
        return Ok(None);
    };

    let absolute = if root.is_absolute() {
        root.to_path_buf()
    } else {
        let absolute = std::env::current_dir()
            .context("resolving relative workspace root")?
            .join(root);
        info!(
            given = %root.display(),
            resolved = %absolute.display(),
            "Workspace root is relative, resolved against the current directory"
        );
        absolute
    };

    match std::fs::canonicalize(&absolute) {
        Ok(canonical) => {
            if canonical != absolute {
                info!(
                    given = %absolute.display(),
                    canonical = %canonical.display(),
                    "Workspace root canonicalized"
                );
            }
            Ok(Some(canonical))
        }
        Err(e) => {
            warn!(
                root = %absolute.display(),
                error = %e,
                "Could not canonicalize workspace root, matching against it as given"
            );
            Ok(Some(absolute))
        }
    }
}

fn current_identity() -> String {
    let user = std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_default();

    match std::env::var("USERDOMAIN") {
        Ok(domain) if cfg!(windows) && !domain.is_empty() && !user.is_empty() => {
            format!("{}\\{}", domain, user)
        }
        _ => user,
    }
}
