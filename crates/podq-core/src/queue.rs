//! Queue file discovery and parsing.
//!
//! The queue is written by the feed reader (newsboat, or newsbeuter before
//! it): one URL per line, optionally followed by whitespace-separated
//! metadata such as a suggested filename. podq only ever consumes it and
//! prunes the lines that downloaded successfully.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use url::Url;

/// Queue locations relative to the home directory, tried in order.
const QUEUE_CANDIDATES: [&str; 2] = [".newsboat/queue", ".newsbeuter/queue"];

/// One parsed queue line scheduled for download.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Parsed form of the line's first whitespace-separated token.
    pub url: Url,
    /// The trimmed original line, kept verbatim so reconciliation can drop
    /// exactly this line once the download succeeds.
    pub raw_line: String,
}

/// The resolved queue file and its parsed, de-duplicated entries.
#[derive(Debug)]
pub struct QueueFile {
    pub path: PathBuf,
    pub entries: Vec<QueueEntry>,
}

/// Opens the first readable queue candidate under `home` and parses it.
///
/// The newsboat path wins; newsbeuter is the legacy fallback. Fails when
/// neither candidate can be opened, or when any line's first token is not a
/// valid absolute URL; a corrupt queue file is not ours to touch.
pub fn load(home: &Path) -> Result<QueueFile> {
    let (path, file) = open_first_candidate(home)?;
    let entries = parse(BufReader::new(file))
        .with_context(|| format!("malformed queue file {}", path.display()))?;
    tracing::debug!(queue = %path.display(), entries = entries.len(), "queue loaded");
    Ok(QueueFile { path, entries })
}

fn open_first_candidate(home: &Path) -> Result<(PathBuf, File)> {
    let mut tried = Vec::new();
    for rel in QUEUE_CANDIDATES {
        let path = home.join(rel);
        match File::open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(err) => tried.push(format!("{}: {err}", path.display())),
        }
    }
    bail!("no queue file could be opened ({})", tried.join("; "))
}

/// Parses queue lines: trim, skip blanks, take the first token as the URL,
/// and keep only the first occurrence of each token.
fn parse(reader: impl BufRead) -> Result<Vec<QueueEntry>> {
    let mut entries = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("failed to read queue line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(token) = trimmed.split_whitespace().next() else {
            continue;
        };
        // first occurrence wins; later duplicates are not downloaded twice
        if !seen.insert(token.to_string()) {
            continue;
        }
        let url = Url::parse(token)
            .with_context(|| format!("line {}: invalid URL {token:?}", idx + 1))?;
        entries.push(QueueEntry {
            url,
            raw_line: trimmed.to_string(),
        });
    }
    Ok(entries)
}
