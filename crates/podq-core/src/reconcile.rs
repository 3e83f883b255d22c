//! Post-run bookkeeping: queue rewrite and the download log.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::scheduler::Download;

/// Log filename, created next to the queue file.
pub const LOG_FILE_NAME: &str = "download.log";

/// Where the download log lives for a given queue file.
pub fn log_path_for(queue_path: &Path) -> PathBuf {
    queue_path.with_file_name(LOG_FILE_NAME)
}

/// Rewrites the queue file, dropping every line whose trimmed text matches
/// the raw line of a succeeded download. Blank lines are dropped too; all
/// other lines keep their order, matching or not yet attempted alike.
///
/// The file is re-read from disk rather than rebuilt from memory, so lines
/// the feed reader appended while downloads were in flight survive. The new
/// content goes to a temp sibling first, is fsynced, and only then renamed
/// over the original, so an interrupted rewrite leaves a stale queue rather
/// than a truncated one.
pub fn rewrite_queue(queue_path: &Path, downloads: &[Download]) -> Result<()> {
    let succeeded: HashSet<&str> = downloads
        .iter()
        .filter(|d| d.succeeded())
        .map(|d| d.raw_line.as_str())
        .collect();

    let file = fs::File::open(queue_path)
        .with_context(|| format!("failed to reopen queue file {}", queue_path.display()))?;
    let mut kept: Vec<String> = Vec::new();
    let mut dropped = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line
            .with_context(|| format!("failed to re-read queue file {}", queue_path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if succeeded.contains(trimmed) {
            dropped += 1;
            continue;
        }
        kept.push(trimmed.to_string());
    }

    let mut content = kept.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }

    let temp = rewrite_temp_path(queue_path);
    let mut file = fs::File::create(&temp)
        .with_context(|| format!("failed to create queue rewrite {}", temp.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write queue rewrite {}", temp.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync queue rewrite {}", temp.display()))?;
    drop(file);
    fs::rename(&temp, queue_path)
        .with_context(|| format!("failed to replace queue file {}", queue_path.display()))?;
    tracing::debug!(queue = %queue_path.display(), kept = kept.len(), dropped, "queue rewritten");
    Ok(())
}

fn rewrite_temp_path(queue_path: &Path) -> PathBuf {
    let mut o = queue_path.as_os_str().to_owned();
    o.push(".tmp");
    PathBuf::from(o)
}

/// Appends one record per download to the log: `<RFC 3339 UTC>\t<1|0>\t<url>`,
/// in the order the downloads completed. The file is created on first use.
///
/// Failures here are the caller's to report as a warning; by contract the
/// run still counts as complete without its log entries.
pub fn append_log(log_path: &Path, downloads: &[Download]) -> Result<()> {
    if downloads.is_empty() {
        return Ok(());
    }
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format log timestamp")?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open download log {}", log_path.display()))?;
    for download in downloads {
        let flag = if download.succeeded() { 1 } else { 0 };
        writeln!(file, "{timestamp}\t{flag}\t{}", download.url)
            .context("failed to append to download log")?;
    }
    tracing::debug!(log = %log_path.display(), records = downloads.len(), "log appended");
    Ok(())
}
