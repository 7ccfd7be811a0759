//! HTTP client for page image downloads.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, REFERER};
use tracing::{debug, instrument};
use url::Url;

use super::DownloadError;
use super::constants::IMAGE_ACCEPT;
use crate::http_client::build_http_client;

/// Client that downloads one page image into memory.
///
/// The client carries no whole-request timeout; each call passes its own so
/// the fetcher can bound every attempt separately.
#[derive(Debug, Clone)]
pub struct PageClient {
    client: Client,
    referer: Option<String>,
}

impl PageClient {
    /// Creates a page client.
    ///
    /// `referer`, when set, is sent with every image request; some page
    /// hosts refuse hotlinked requests without it.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the HTTP client cannot be constructed.
    pub fn new(referer: Option<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(None)?,
            referer,
        })
    }

    /// Downloads `url` and returns the full body.
    ///
    /// Non-2xx statuses and zero-length bodies are errors.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] describing the failed attempt.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let mut request = self
            .client
            .get(url)
            .timeout(timeout)
            .header(ACCEPT, IMAGE_ACCEPT);
        if let Some(referer) = &self.referer {
            request = request.header(REFERER, referer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        if bytes.is_empty() {
            return Err(DownloadError::empty_body(url));
        }

        debug!(bytes = bytes.len(), "page downloaded");
        Ok(bytes.to_vec())
    }
}
