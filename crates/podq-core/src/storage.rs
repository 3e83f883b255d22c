//! Disk persistence for fetched episodes.
//!
//! Streams a response body into a `.part` sibling and links it into place
//! once the copy and fsync completed. Existing files are never overwritten:
//! the temp is claimed with `create_new`, the final name with `hard_link`
//! (which fails instead of replacing), and both walk numeric suffixes past
//! whatever already exists. Concurrent saves of the same basename therefore
//! each land on their own file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::DownloadError;

/// Temporary file suffix used while the body is still being copied.
pub const TEMP_SUFFIX: &str = ".part";

/// Fallback name when the URL path has no usable final segment.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Upper bound for the suffix probe so a pathological directory cannot spin
/// the collision loop forever.
const MAX_SUFFIX_PROBES: u32 = 10_000;

/// Saves `body` under `dir`, named after the URL.
///
/// The bytes go to a `.part` temp file first (claimed exclusively, with its
/// own collision suffix) and are linked into the final name only after the
/// full copy and an fsync succeeded, so a final name only ever holds a
/// complete file and never replaces one that another writer placed first.
/// On a failed copy the partial `.part` file is left behind for inspection
/// and no final file appears.
pub fn save_stream(body: &mut dyn Read, dir: &Path, url: &Url) -> Result<PathBuf, DownloadError> {
    let want = dir.join(filename_for(url));
    let hint = free_path(&want)?;
    let (temp_path, mut temp) = claim_temp(&hint)?;
    tracing::debug!(temp = %temp_path.display(), "writing body");

    io::copy(body, &mut temp)?;
    temp.sync_all()?;
    drop(temp);

    let final_path = link_into_place(&temp_path, &want)?;
    tracing::debug!(file = %final_path.display(), "saved");
    Ok(final_path)
}

/// Filename derived from the URL path: the last non-empty segment, or
/// `download.bin` when there is none (`.` and `..` never qualify). The query
/// string is not part of the path and never leaks into the name.
pub fn filename_for(url: &Url) -> String {
    url.path()
        .split('/')
        .filter(|seg| !seg.is_empty())
        .last()
        .filter(|seg| *seg != "." && *seg != "..")
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Path for the temp file: appends `.part` (e.g. `ep.mp3` → `ep.mp3.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

fn suffixed(base: &Path, n: u32) -> PathBuf {
    let mut o = base.as_os_str().to_owned();
    o.push(format!(".{n}"));
    PathBuf::from(o)
}

fn probes_exhausted(base: &Path) -> DownloadError {
    DownloadError::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "no free path after {MAX_SUFFIX_PROBES} suffixes of {}",
            base.display()
        ),
    ))
}

/// First unused candidate derived from `want`: the path itself, then
/// `<path>.1`, `<path>.2`, … Only a naming hint for the temp file; the
/// claim that actually reserves a final name is the hard link in
/// `link_into_place`.
fn free_path(want: &Path) -> Result<PathBuf, DownloadError> {
    if !want.exists() {
        return Ok(want.to_path_buf());
    }
    for n in 1..=MAX_SUFFIX_PROBES {
        let candidate = suffixed(want, n);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(probes_exhausted(want))
}

/// Claims the temp file for `final_path` with `create_new`, probing numeric
/// suffixes on collision, so no two writers ever share a partial file.
fn claim_temp(final_path: &Path) -> Result<(PathBuf, File), DownloadError> {
    let base = temp_path(final_path);
    let mut candidate = base.clone();
    let mut probes = 0u32;
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                probes += 1;
                if probes > MAX_SUFFIX_PROBES {
                    return Err(probes_exhausted(&base));
                }
                candidate = suffixed(&base, probes);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Gives the finished temp file its final name, starting at `want` and
/// walking numeric suffixes. `hard_link` fails with `AlreadyExists` rather
/// than replacing an existing file, so the name that comes back is owned by
/// this save alone even when another writer races for the same one.
fn link_into_place(temp_path: &Path, want: &Path) -> Result<PathBuf, DownloadError> {
    let mut candidate = want.to_path_buf();
    let mut probes = 0u32;
    loop {
        match fs::hard_link(temp_path, &candidate) {
            Ok(()) => {
                // the episode is in place; a stray temp is the worst case
                if let Err(err) = fs::remove_file(temp_path) {
                    tracing::debug!(
                        error = %err,
                        temp = %temp_path.display(),
                        "temp file not removed"
                    );
                }
                return Ok(candidate);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                probes += 1;
                if probes > MAX_SUFFIX_PROBES {
                    return Err(probes_exhausted(want));
                }
                candidate = suffixed(want, probes);
            }
            Err(err) => return Err(err.into()),
        }
    }
}
