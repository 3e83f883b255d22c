//! CLI parse tests and run-level tests over a fake transport.

use super::*;
use clap::error::ErrorKind;
use podq_core::error::DownloadError;
use podq_core::fetch::{ByteStream, StatusCode};
use std::collections::HashMap;
use std::io::{self, Cursor};
use std::sync::Mutex;
use tempfile::tempdir;
use url::Url;

#[test]
fn parse_no_args_leaves_directory_unset() {
    let cli = Cli::try_parse_from(["podq"]).unwrap();
    assert!(cli.directory.is_none());
}

#[test]
fn parse_directory_argument() {
    let cli = Cli::try_parse_from(["podq", "/media/podcasts"]).unwrap();
    assert_eq!(cli.directory.as_deref(), Some(Path::new("/media/podcasts")));
}

#[test]
fn parse_rejects_extra_arguments() {
    let err = Cli::try_parse_from(["podq", "/a", "/b"]).unwrap_err();
    assert!(err.use_stderr());
}

#[test]
fn parse_help_is_not_an_error_report() {
    let err = Cli::try_parse_from(["podq", "--help"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    assert!(!err.use_stderr());
}

#[test]
fn parse_has_no_version_flag() {
    let err = Cli::try_parse_from(["podq", "--version"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    assert!(err.use_stderr());
}

#[test]
fn durations_render_in_clock_units() {
    assert_eq!(format_duration(0), "0s");
    assert_eq!(format_duration(45), "45s");
    assert_eq!(format_duration(60), "1m0s");
    assert_eq!(format_duration(95), "1m35s");
    assert_eq!(format_duration(3600), "1h0m0s");
    assert_eq!(format_duration(3661), "1h1m1s");
}

/// Canned transport so run() can be driven without a network.
enum Plan {
    Body(&'static [u8]),
    Status(u16),
}

struct FakeFetcher {
    plans: Mutex<HashMap<String, Plan>>,
}

impl FakeFetcher {
    fn new(plans: Vec<(&str, Plan)>) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(
                plans
                    .into_iter()
                    .map(|(u, p)| (u.to_string(), p))
                    .collect(),
            ),
        })
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &Url) -> Result<ByteStream, DownloadError> {
        match self.plans.lock().unwrap().remove(url.as_str()) {
            Some(Plan::Body(bytes)) => Ok(Box::new(Cursor::new(bytes.to_vec()))),
            Some(Plan::Status(code)) => Err(DownloadError::HttpStatus(
                StatusCode::from_u16(code).unwrap(),
            )),
            None => Err(DownloadError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("unplanned fetch of {url}"),
            ))),
        }
    }
}

fn write_queue(home: &Path, content: &str) -> PathBuf {
    let dir = home.join(".newsboat");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("queue");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn empty_queue_is_a_clean_run() {
    let home = tempdir().unwrap();
    let target = tempdir().unwrap();
    let queue_path = write_queue(home.path(), "");

    run(
        Some(target.path().to_path_buf()),
        home.path(),
        FakeFetcher::new(vec![]),
    )
    .unwrap();

    // untouched: no rewrite, no log
    assert_eq!(fs::read_to_string(&queue_path).unwrap(), "");
    assert!(!home.path().join(".newsboat/download.log").exists());
}

#[test]
fn missing_queue_is_fatal() {
    let home = tempdir().unwrap();
    let target = tempdir().unwrap();

    let err = run(
        Some(target.path().to_path_buf()),
        home.path(),
        FakeFetcher::new(vec![]),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("queue"));
}

#[test]
fn explicit_directory_must_exist() {
    let home = tempdir().unwrap();
    let missing = home.path().join("no-such-dir");

    let err = run(Some(missing.clone()), home.path(), FakeFetcher::new(vec![])).unwrap_err();
    assert!(format!("{err:#}").contains("cannot use download directory"));
    // it is not created as a side effect
    assert!(!missing.exists());
}

#[test]
fn full_run_saves_reconciles_and_logs() {
    let home = tempdir().unwrap();
    let target = tempdir().unwrap();
    write_queue(
        home.path(),
        "http://a.example/pod/ep1.mp3\n\
         http://a.example/pod/ep2.mp3\n\
         http://b.example/feed/ep3.mp3\n",
    );
    let fetcher = FakeFetcher::new(vec![
        ("http://a.example/pod/ep1.mp3", Plan::Status(500)),
        ("http://a.example/pod/ep2.mp3", Plan::Body(b"episode two")),
        ("http://b.example/feed/ep3.mp3", Plan::Body(b"episode three")),
    ]);

    run(Some(target.path().to_path_buf()), home.path(), fetcher).unwrap();

    assert_eq!(
        fs::read(target.path().join("ep2.mp3")).unwrap(),
        b"episode two"
    );
    assert_eq!(
        fs::read(target.path().join("ep3.mp3")).unwrap(),
        b"episode three"
    );
    assert!(!target.path().join("ep1.mp3").exists());

    assert_eq!(
        fs::read_to_string(home.path().join(".newsboat/queue")).unwrap(),
        "http://a.example/pod/ep1.mp3\n"
    );

    let log = fs::read_to_string(home.path().join(".newsboat/download.log")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines
            .iter()
            .filter(|l| l.split('\t').nth(1) == Some("1"))
            .count(),
        2
    );
    assert_eq!(
        lines
            .iter()
            .filter(|l| l.split('\t').nth(1) == Some("0"))
            .count(),
        1
    );
}

#[test]
fn per_item_failures_do_not_fail_the_run() {
    let home = tempdir().unwrap();
    let target = tempdir().unwrap();
    write_queue(home.path(), "http://a.example/ep.mp3\n");
    let fetcher = FakeFetcher::new(vec![("http://a.example/ep.mp3", Plan::Status(404))]);

    // every item failed, yet the run itself is fine
    run(Some(target.path().to_path_buf()), home.path(), fetcher).unwrap();

    assert_eq!(
        fs::read_to_string(home.path().join(".newsboat/queue")).unwrap(),
        "http://a.example/ep.mp3\n"
    );
}
