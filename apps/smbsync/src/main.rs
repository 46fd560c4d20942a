//! smbsync entry point.
//!
//! Exit status: 0 when every selected file was synced (or nothing matched),
//! 1 when at least one file failed, 2 when the run could not start.

mod cli;
mod config;
mod logging;
mod progress;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use smbsync_file_ops::select_files;
use smbsync_share::connect;
use smbsync_transfer::{BatchRunner, BatchSummary};
use tracing::{error, info};

use crate::cli::Cli;
use crate::config::Config;
use crate::progress::TerminalProgress;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(summary) => {
            println!(
                "attempted={} succeeded={} failed={}",
                summary.attempted, summary.succeeded, summary.failed
            );
            if summary.all_succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("smbsync: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<BatchSummary> {
    let config = Config::from_cli(cli)?;
    logging::init(&config.log_level, &config.log)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        source = %config.path.display(),
        pattern = %config.regex,
        zip = config.zip,
        delete = config.delete,
        "starting smbsync"
    );

    let result = sync(&config);
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "sync aborted");
    }
    result
}

fn sync(config: &Config) -> anyhow::Result<BatchSummary> {
    let files = without_log_file(
        select_files(&config.path, &config.regex)?,
        &config.path,
        &config.log,
    );
    if files.is_empty() {
        info!(source = %config.path.display(), pattern = %config.regex, "no files matched");
        return Ok(BatchSummary::default());
    }
    info!(count = files.len(), "files selected");

    let share = connect(&config.share())?;
    let batch = config.batch();
    let progress = TerminalProgress::new();
    Ok(BatchRunner::new(&share, &batch)
        .with_sink(&progress)
        .run(&files))
}

/// Drops the run's own log file from the selection; it is open for
/// writing and must never be sent or deleted.
fn without_log_file(files: Vec<String>, source_dir: &Path, log: &Path) -> Vec<String> {
    let log = resolve(log);
    files
        .into_iter()
        .filter(|name| {
            let keep = resolve(&source_dir.join(name)) != log;
            if !keep {
                info!(file = %name, "skipping the active log file");
            }
            keep
        })
        .collect()
}

fn resolve(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
