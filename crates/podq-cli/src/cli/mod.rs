//! CLI for the podq queue downloader.
//!
//! One optional positional argument (the download directory) and one run
//! mode: drain the queue, report per-item results as they complete, then
//! reconcile the queue file.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use podq_core::fetch::{Fetcher, HttpFetcher};
use podq_core::queue;
use podq_core::reconcile;
use podq_core::scheduler::{self, Download};

/// Built-in download directory used when none is given.
const DEFAULT_DOWNLOAD_DIR: &str = "/tmp/audio";

/// Fetch podcast episodes queued by newsboat, one connection per host.
#[derive(Debug, Parser)]
#[command(name = "podq")]
#[command(about = "podq: drain the newsboat podcast queue politely", long_about = None)]
pub struct Cli {
    /// Directory to save episodes into; must exist. Defaults to /tmp/audio,
    /// which is created when missing.
    #[arg(value_name = "DIRECTORY")]
    pub directory: Option<PathBuf>,
}

pub fn run_from_args() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help reports on stdout and exits 0; everything clap rejects
            // (unknown flags included) goes to stderr and exits 1, not
            // clap's default 2
            let failed = err.use_stderr();
            let _ = err.print();
            std::process::exit(if failed { 1 } else { 0 });
        }
    };
    let home = resolve_home()?;
    let fetcher = Arc::new(HttpFetcher::new()?);
    run(cli.directory, &home, fetcher)
}

/// Home directory from `$HOME`; the queue lives underneath it.
fn resolve_home() -> Result<PathBuf> {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => bail!("HOME is not set; cannot locate the podcast queue"),
    }
}

/// Full run against `home`'s queue: prepare the directory, download
/// everything, reconcile. Fatal preconditions come back as errors; per-item
/// failures are reported inline and their lines stay queued.
pub fn run(directory: Option<PathBuf>, home: &Path, fetcher: Arc<dyn Fetcher>) -> Result<()> {
    let (dir, created) = prepare_directory(directory)?;
    let result = run_in_dir(&dir, home, fetcher);
    if created {
        // drop the default dir again if this run never filled it; rmdir
        // refuses to remove a non-empty directory
        let _ = fs::remove_dir(&dir);
    }
    result
}

/// Resolves the target directory. A user-supplied directory must already
/// exist; the built-in default is created on demand and flagged as ours to
/// clean up.
fn prepare_directory(directory: Option<PathBuf>) -> Result<(PathBuf, bool)> {
    match directory {
        Some(dir) => {
            let meta = fs::metadata(&dir)
                .with_context(|| format!("cannot use download directory {}", dir.display()))?;
            if !meta.is_dir() {
                bail!("not a directory: {}", dir.display());
            }
            Ok((dir, false))
        }
        None => {
            let dir = PathBuf::from(DEFAULT_DOWNLOAD_DIR);
            let created = !dir.exists();
            fs::create_dir_all(&dir)
                .with_context(|| format!("cannot create download directory {}", dir.display()))?;
            Ok((dir, created))
        }
    }
}

fn run_in_dir(dir: &Path, home: &Path, fetcher: Arc<dyn Fetcher>) -> Result<()> {
    let queue = queue::load(home)?;
    if queue.entries.is_empty() {
        println!("Nothing queued");
        return Ok(());
    }

    for entry in &queue.entries {
        println!("Queued: {}", entry.url);
    }
    println!("Downloading to {} ...", dir.display());

    let total = queue.entries.len();
    let queue_path = queue.path;
    let mut completed: Vec<Download> = Vec::with_capacity(total);
    for download in scheduler::download_all(queue.entries, dir, fetcher) {
        report(&download, completed.len() + 1, total);
        completed.push(download);
    }

    reconcile::rewrite_queue(&queue_path, &completed)?;

    let log_path = reconcile::log_path_for(&queue_path);
    if let Err(err) = reconcile::append_log(&log_path, &completed) {
        tracing::warn!(error = %err, "download log not written");
        eprintln!("warning: download log not written: {err:#}");
    }
    Ok(())
}

/// One report per completed item, in completion order across hosts.
fn report(download: &Download, n: usize, total: usize) {
    println!("({n}/{total}) {}", download.url);
    match &download.outcome {
        Some(Ok(_)) => {
            let secs = download
                .started_at
                .map(|t| t.elapsed().as_secs_f64().round() as u64)
                .unwrap_or(0);
            println!("Ok: {} duration", format_duration(secs));
            if n != total {
                println!();
            }
        }
        Some(Err(err)) => println!("Error: {err}"),
        None => println!("Error: item never ran"),
    }
}

/// Renders whole seconds in clock units (`45s`, `1m35s`, `1h1m1s`). Zero
/// minutes and seconds still print when a larger unit is present (`1h0m0s`).
fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests;
