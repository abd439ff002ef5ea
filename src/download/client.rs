//! HTTP client wrapper shared across discovery, probing, and transfers.
//!
//! One client is built per run from the [`RunConfig`] and cloned into
//! worker tasks; reqwest's connection pool is shared behind the clones.
//! Probe and transfer requests disable transparent compression so byte
//! counts line up with `Content-Length` and `Range` arithmetic.

use reqwest::header::{ACCEPT_ENCODING, RANGE};
use reqwest::{Client, Method, Response};
use tracing::debug;

use super::constants::USER_AGENT;
use super::error::DownloadError;
use crate::config::RunConfig;

/// HTTP client for index pages and artifact transfers.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a client from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] when reqwest rejects the
    /// combined TLS/timeout configuration.
    pub fn from_config(cfg: &RunConfig) -> Result<Self, DownloadError> {
        let mut builder = Client::builder()
            .connect_timeout(cfg.connect_timeout)
            .read_timeout(cfg.read_timeout)
            .pool_max_idle_per_host(cfg.workers.saturating_mul(2))
            .gzip(true)
            .user_agent(USER_AGENT);
        if !cfg.http2 {
            builder = builder.http1_only();
        }
        if cfg.insecure {
            debug!("TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder
            .build()
            .map(|client| Self { client })
            .map_err(DownloadError::client_build)
    }

    /// Fetches an index page body as text.
    ///
    /// # Errors
    ///
    /// Returns an error on connect/read failures or non-2xx statuses.
    pub async fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        let response = self.send(Method::GET, url, false, None).await?;
        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| DownloadError::network(url, e))
    }

    /// HEAD request with compression disabled, for size probing.
    ///
    /// The response is returned regardless of status; probing inspects
    /// status and headers itself.
    ///
    /// # Errors
    ///
    /// Returns an error only on connect/read failures.
    pub async fn head_identity(&self, url: &str) -> Result<Response, DownloadError> {
        self.send(Method::HEAD, url, true, None).await
    }

    /// Single-byte range request (`bytes=0-0`), for size probing via the
    /// `Content-Range` total.
    ///
    /// # Errors
    ///
    /// Returns an error only on connect/read failures.
    pub async fn get_first_byte(&self, url: &str) -> Result<Response, DownloadError> {
        self.send(Method::GET, url, true, Some("bytes=0-0".to_string()))
            .await
    }

    /// Plain GET with compression disabled, returned without status
    /// enforcement. Used by size probing to read declared lengths from
    /// the response headers without consuming the body.
    ///
    /// # Errors
    ///
    /// Returns an error only on connect/read failures.
    pub async fn get_identity(&self, url: &str) -> Result<Response, DownloadError> {
        self.send(Method::GET, url, true, None).await
    }

    /// Streaming GET with compression disabled and an optional resume offset.
    ///
    /// Callers distinguish 200 (full body) from 206 (partial content).
    ///
    /// # Errors
    ///
    /// Returns an error on connect/read failures or non-2xx statuses.
    pub async fn get_streaming(
        &self,
        url: &str,
        resume_offset: u64,
    ) -> Result<Response, DownloadError> {
        let range = (resume_offset > 0).then(|| format!("bytes={resume_offset}-"));
        let response = self.send(Method::GET, url, true, range).await?;
        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }
        Ok(response)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        identity: bool,
        range: Option<String>,
    ) -> Result<Response, DownloadError> {
        let mut request = self.client.request(method, url);
        if identity {
            request = request.header(ACCEPT_ENCODING, "identity");
        }
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })
    }

}
