//! lookaside::origin
//!
//! Downloading blobs from their origin.
//!
//! [`HttpFetcher`] handles `http(s)://` with optional basic auth and also
//! reads `file://` URLs, which lets a local directory act as the origin.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::LookasideError;
use crate::core::config::BasicAuth;

/// Timeout for a single download.
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Source of blob bytes by URL.
pub trait OriginFetcher: Send + Sync {
    /// Download the content at `url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LookasideError>;
}

/// Blocking HTTP (and `file://`) fetcher.
pub struct HttpFetcher {
    client: Client,
    basic_auth: Option<BasicAuth>,
}

impl HttpFetcher {
    /// Create a fetcher, optionally sending basic credentials.
    ///
    /// # Errors
    ///
    /// Returns `LookasideError::Download` if the HTTP client cannot be built.
    pub fn new(basic_auth: Option<BasicAuth>) -> Result<Self, LookasideError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| LookasideError::Download {
                url: String::new(),
                message: format!("could not create http client: {e}"),
            })?;
        Ok(Self { client, basic_auth })
    }
}

impl OriginFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LookasideError> {
        let download_err = |message: String| LookasideError::Download {
            url: url.to_string(),
            message,
        };

        if let Some(path) = url.strip_prefix("file://") {
            debug!(url, "reading origin file");
            return std::fs::read(path).map_err(|e| download_err(e.to_string()));
        }

        let mut request = self.client.get(url).header("Accept-Encoding", "*");
        if let Some(auth) = &self.basic_auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request.send().map_err(|e| download_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_err(format!("http status {}", response.status())));
        }
        let bytes = response.bytes().map_err(|e| download_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
