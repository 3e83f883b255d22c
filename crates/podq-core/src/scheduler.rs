//! Per-host download scheduling.
//!
//! Queued items are partitioned by host up front; each host group gets one
//! worker thread that walks its group strictly in queue order, so a remote
//! server never sees more than one concurrent connection from us while
//! distinct hosts proceed in parallel. Workers own their items outright and
//! share nothing but the results channel: a finished [`Download`] is sent
//! back with its outcome filled in, and once every worker has dropped its
//! sender the channel disconnects. That disconnect is the driver's only
//! completion signal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use url::Url;

use crate::error::DownloadError;
use crate::fetch::Fetcher;
use crate::queue::QueueEntry;
use crate::storage;

/// How a finished item ended: the saved path, or why it failed.
pub type DownloadOutcome = Result<PathBuf, DownloadError>;

/// One queued item moving through fetch and save.
///
/// Built before any worker starts, mutated only by the worker that owns its
/// group, and read-only once it comes back on the results channel.
#[derive(Debug)]
pub struct Download {
    pub url: Url,
    /// Trimmed queue line this item came from; the reconciliation key.
    pub raw_line: String,
    /// Directory the episode is saved under.
    pub target_dir: PathBuf,
    /// Set by the worker immediately before the fetch begins.
    pub started_at: Option<Instant>,
    /// None while in flight; exactly one success or failure afterwards.
    pub outcome: Option<DownloadOutcome>,
}

impl Download {
    pub fn new(entry: QueueEntry, target_dir: PathBuf) -> Self {
        Self {
            url: entry.url,
            raw_line: entry.raw_line,
            target_dir,
            started_at: None,
            outcome: None,
        }
    }

    /// True once the worker recorded a successful save.
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Some(Ok(_)))
    }
}

/// Downloads for one host, processed strictly in queue order.
#[derive(Debug)]
pub struct HostGroup {
    pub host: String,
    pub downloads: Vec<Download>,
}

/// Grouping key for politeness: the URL's host, plus the port when one is
/// spelled out, so two servers on the same machine count as separate hosts.
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Partitions entries into host groups. Entries keep their queue order
/// within each group; groups appear in first-URL order.
pub fn group_by_host(entries: Vec<QueueEntry>, target_dir: &Path) -> Vec<HostGroup> {
    let mut groups: Vec<HostGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        let key = host_key(&entry.url);
        let download = Download::new(entry, target_dir.to_path_buf());
        match index.get(&key) {
            Some(&i) => groups[i].downloads.push(download),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(HostGroup {
                    host: key,
                    downloads: vec![download],
                });
            }
        }
    }
    groups
}

/// Runs every entry to completion: one detached worker thread per host
/// group, all results merged onto the returned channel.
///
/// Iterate the receiver until it disconnects. The scheduler's own sender is
/// dropped before this returns and each worker drops its clone after its
/// last item, so disconnection means every group ran to the end: one attempt
/// per item, with failures recorded rather than aborting anything.
pub fn download_all(
    entries: Vec<QueueEntry>,
    target_dir: &Path,
    fetcher: Arc<dyn Fetcher>,
) -> Receiver<Download> {
    let groups = group_by_host(entries, target_dir);
    let (tx, rx) = mpsc::channel();
    tracing::debug!(hosts = groups.len(), "dispatching host workers");
    for group in groups {
        let tx = tx.clone();
        let fetcher = Arc::clone(&fetcher);
        // workers are deliberately detached; the channel hanging up is the
        // completion barrier
        let _ = thread::spawn(move || run_host_group(group, fetcher.as_ref(), &tx));
    }
    drop(tx);
    rx
}

/// Walks one host group in order. Each item is attempted exactly once; a
/// failure is recorded on the item and the walk continues with the next.
fn run_host_group(group: HostGroup, fetcher: &dyn Fetcher, results: &Sender<Download>) {
    tracing::debug!(host = %group.host, items = group.downloads.len(), "worker started");
    for mut download in group.downloads {
        download.started_at = Some(Instant::now());
        let outcome = fetcher
            .fetch(&download.url)
            .and_then(|mut body| storage::save_stream(body.as_mut(), &download.target_dir, &download.url));
        match &outcome {
            Ok(path) => tracing::debug!(url = %download.url, file = %path.display(), "download ok"),
            Err(err) => tracing::debug!(url = %download.url, error = %err, "download failed"),
        }
        download.outcome = Some(outcome);
        if results.send(download).is_err() {
            // receiver hung up; no one left to report to
            return;
        }
    }
    tracing::debug!(host = %group.host, "worker finished");
}
