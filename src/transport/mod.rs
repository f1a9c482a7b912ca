//! Remote submission transport and bounded page fetcher.
//!
//! The [`Transport`] trait is the seam between the pipeline and the remote
//! transfer-queueing service; [`HttpTransport`] is the production
//! implementation. [`with_retry`] wraps any transport operation in a bounded
//! linear-backoff retry. [`PageFetcher`] downloads pages for selection-based
//! extraction with strict size and time bounds.

pub mod error;

pub use error::TransportError;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::magnet::{canonical, MagnetLink};

/// Base URL of the remote transfer-queueing API.
pub const API_BASE: &str = "https://api.put.io/v2";

/// Timeout for a single submission request.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(25);

/// Timeout for fetching a source page.
pub const PAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(12);

/// Maximum accepted page size in bytes.
pub const MAX_PAGE_BYTES: u64 = 3 * 1024 * 1024;

/// Total attempts made by [`with_retry`] before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Base unit of the linear retry delay (attempt number times this).
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// The transfer object the remote returns on a successful submission.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferInfo {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Successful submission response body.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitReceipt {
    pub transfer: TransferInfo,
}

/// Remote error body shape; only the message field matters here.
#[derive(Debug, Deserialize)]
struct RemoteError {
    #[serde(default)]
    error_message: Option<String>,
}

/// The submission seam. Implemented by [`HttpTransport`] in production and
/// by in-memory fakes in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submits one magnet link to the remote queue.
    async fn submit(&self, link: &MagnetLink) -> Result<SubmitReceipt, TransportError>;
}

/// HTTP implementation of [`Transport`] against the transfers API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl HttpTransport {
    /// Builds a transport against the production API base.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::MissingCredential` when the token is blank,
    /// or `TransportError::Network` if the client cannot be constructed.
    pub fn new(token: &str) -> Result<Self, TransportError> {
        Self::with_base(token, API_BASE)
    }

    /// Builds a transport against an arbitrary base URL.
    ///
    /// # Errors
    ///
    /// Same conditions as [`HttpTransport::new`].
    pub fn with_base(token: &str, base: &str) -> Result<Self, TransportError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TransportError::MissingCredential);
        }

        let client = reqwest::Client::builder()
            .timeout(SUBMIT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn classify(e: &reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, link), fields(hash = ?link.info_hash()))]
    async fn submit(&self, link: &MagnetLink) -> Result<SubmitReceipt, TransportError> {
        let canonical = canonical::canonicalize(link.as_str()).ok_or(TransportError::InvalidMagnet)?;

        let response = self
            .client
            .post(format!("{}/transfers/add", self.base))
            .bearer_auth(&self.token)
            .form(&[("url", canonical.as_str()), ("save_parent_id", "0")])
            .send()
            .await
            .map_err(|e| Self::classify(&e))?;

        let status = response.status();
        if status.is_success() {
            let receipt: SubmitReceipt = response
                .json()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;
            debug!(transfer_id = receipt.transfer.id, "transfer queued");
            return Ok(receipt);
        }

        let remote_message = response
            .json::<RemoteError>()
            .await
            .ok()
            .and_then(|body| body.error_message);

        Err(TransportError::from_status(status.as_u16(), remote_message))
    }
}

/// Runs `operation` up to `max_attempts` times, retrying only retryable
/// errors with a linear `attempt * 1s` wait between tries.
///
/// Returns the first success or the last failure. No jitter: attempt counts
/// are small and the delays are user-visible.
///
/// # Errors
///
/// Propagates the final `TransportError` after attempts are exhausted or a
/// terminal error occurs.
pub async fn with_retry<T, F, Fut>(max_attempts: u32, mut operation: F) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = RETRY_BASE_DELAY * attempt;
                warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Downloads source pages for selection-based extraction.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    /// # Errors
    ///
    /// Returns `TransportError::Network` if the client cannot be built.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(PAGE_FETCH_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Fetches a page body as text.
    ///
    /// Only `http`/`https` URLs are accepted. Bodies over
    /// [`MAX_PAGE_BYTES`] are rejected, checked against the Content-Length
    /// header first and the actual body length after download.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Network` for scheme violations and
    /// connection failures, `TransportError::Timeout` on timeout,
    /// `TransportError::PageTooLarge` when the size bound is exceeded, and
    /// a classified status error for non-2xx responses.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<String, TransportError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::Network(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| HttpTransport::classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::from_status(status.as_u16(), None));
        }

        if let Some(length) = response.content_length() {
            if length > MAX_PAGE_BYTES {
                return Err(TransportError::PageTooLarge { bytes: length });
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let bytes = body.len() as u64;
        if bytes > MAX_PAGE_BYTES {
            return Err(TransportError::PageTooLarge { bytes });
        }

        debug!(bytes, "page fetched");
        Ok(body)
    }
}
