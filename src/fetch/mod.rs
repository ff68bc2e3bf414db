// src/fetch/mod.rs

//! Source fetching
//!
//! This module provides functionality for:
//! - Downloading source archives over HTTP(S)
//! - Reading local archives from `file://` URLs or plain paths
//! - Verifying archive checksums
//! - Extracting archives into a build directory
//!
//! Fetches are attempted once; a transport failure is reported as a
//! network error and nothing is retried.

pub mod extract;
pub mod verify;

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub use extract::{ArchiveKind, ExtractedSource, extract};
pub use verify::verify;

/// Default timeout for HTTP requests (5 minutes; source tarballs can be large)
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Where a source URL points
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Http(String),
    Local(PathBuf),
}

impl Location {
    fn parse(url: &str) -> Result<Self> {
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(Self::Http(url.to_string()))
        } else if let Some(path) = url.strip_prefix("file://") {
            Ok(Self::Local(PathBuf::from(path)))
        } else if let Some((scheme, _)) = url.split_once("://") {
            Err(Error::NetworkError(format!(
                "Unsupported URL scheme '{}' in {}",
                scheme, url
            )))
        } else {
            Ok(Self::Local(PathBuf::from(url)))
        }
    }
}

/// Blocking source fetcher
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with the default HTTP timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    /// Create a fetcher with a custom HTTP timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("formulary/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Retrieve the bytes behind `url`
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        info!("Fetching {}", url);

        let bytes = match Location::parse(url)? {
            Location::Http(url) => self.fetch_http(&url)?,
            Location::Local(path) => std::fs::read(&path).map_err(|e| {
                Error::NetworkError(format!("Failed to read {}: {}", path.display(), e))
            })?,
        };

        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::NetworkError(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::NetworkError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let mut bytes = Vec::new();
        response
            .read_to_end(&mut bytes)
            .map_err(|e| Error::NetworkError(format!("Failed to read body of {}: {}", url, e)))?;

        Ok(bytes)
    }
}
