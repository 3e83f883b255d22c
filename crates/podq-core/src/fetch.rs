//! HTTP fetching behind an injectable capability.
//!
//! Workers only ever see the [`Fetcher`] trait, so tests can swap in a canned
//! transport; [`HttpFetcher`] is the real one. One blocking GET per call, a
//! bounded connect timeout, and no deadline on the transfer itself.

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use url::Url;

pub use reqwest::StatusCode;

use crate::error::DownloadError;

/// How long a connection attempt may take before the item fails.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(20);

/// Body stream handed to the storage layer. Dropping it closes the
/// underlying connection, whether or not the body was consumed.
pub type ByteStream = Box<dyn Read + Send>;

/// Capability to fetch one URL as a byte stream.
pub trait Fetcher: Send + Sync {
    /// Performs a single GET. The body is returned only for 200 OK; any
    /// other status is an error, and the implementation disposes of the
    /// response before returning it.
    fn fetch(&self, url: &Url) -> Result<ByteStream, DownloadError>;
}

/// Production fetcher over a shared blocking `reqwest` client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds the client: 20 s connect timeout, redirects followed, and the
    /// blocking client's default whole-request timeout disabled so a long
    /// transfer is never cut off.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DIAL_TIMEOUT)
            .timeout(None::<Duration>)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<ByteStream, DownloadError> {
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            // response dropped here, closing the connection
            return Err(DownloadError::HttpStatus(status));
        }
        Ok(Box::new(response))
    }
}
