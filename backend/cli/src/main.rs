//! build-reaper - Reap orphaned build processes before workspace teardown
//!
//! Runs once per CI job teardown. Exits 0 when no process from the build
//! tree is left running, non-zero otherwise; the orchestrator must not
//! delete the workspace unless this succeeds.

mod reap;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Exit status for startup failures (bad arguments or configuration).
const EXIT_STARTUP_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "build-reaper")]
#[command(author, version, about = "Terminate leftover build processes holding the workspace")]
pub struct Cli {
    /// Absolute workspace root; its build directory anchors the match pattern
    #[arg(long, env = "GITHUB_WORKSPACE")]
    pub workspace_root: Option<PathBuf>,

    /// Configuration file (default: <config dir>/build-reaper/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Polls per wait window after each termination attempt
    #[arg(long)]
    pub wait_tries: Option<u32>,

    /// Delay before each poll, in milliseconds
    #[arg(long)]
    pub wait_interval_ms: Option<u64>,

    /// Name of the build output directory under the workspace root
    #[arg(long)]
    pub build_dir_name: Option<String>,

    /// Account identity used to gate the cache sweep (default: current user)
    #[arg(long)]
    pub identity: Option<String>,

    /// Never run the auxiliary cache sweep
    #[arg(long)]
    pub skip_sweep: bool,

    /// Log cache sweep deletions without performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON on stdout (logs go to stderr)
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    match reap::run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Reaper could not start");
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let writer = if json {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(writer)
        .init();
}
