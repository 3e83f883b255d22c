//! Per-download error taxonomy.

use thiserror::Error;

/// Why a single queued item failed.
///
/// These errors are recorded on the item's outcome and reported inline; they
/// never abort the run. Fatal precondition failures (unreadable queue,
/// unusable directory) travel as `anyhow::Error` instead.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Transport failure: DNS, connect, TLS handshake, or a body stream that
    /// died mid-transfer.
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with something other than 200 OK.
    #[error("HTTP status: {0}")]
    HttpStatus(reqwest::StatusCode),

    /// Local disk failure while persisting the body.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn http_status_display_includes_code_and_reason() {
        let err = DownloadError::HttpStatus(reqwest::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "HTTP status: 404 Not Found");
    }

    #[test]
    fn io_errors_convert_and_keep_their_source() {
        let err: DownloadError =
            io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(err.to_string().starts_with("io: "));
        assert!(err.source().is_some());
    }
}
