//! Transport error taxonomy.

use thiserror::Error;

/// Errors produced by the submission transport and page fetcher.
///
/// The taxonomy separates terminal failures (bad credential, bad input,
/// remote rejection) from transient ones worth a bounded retry.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The candidate is not a grammar-valid magnet URI.
    #[error("not a valid magnet link")]
    InvalidMagnet,

    /// No API token is configured.
    #[error("no API token configured")]
    MissingCredential,

    /// The remote rejected the credential (HTTP 401).
    #[error("API token rejected")]
    InvalidCredential,

    /// The remote is rate-limiting requests (HTTP 429).
    #[error("rate limited by remote service")]
    RateLimited,

    /// The remote failed on its side (HTTP 5xx).
    #[error("remote server error (status {status})")]
    RemoteServer { status: u16 },

    /// Any other non-success HTTP response; message comes from the remote
    /// error body when present.
    #[error("request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// A connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// A fetched page exceeded the size bound.
    #[error("page too large ({bytes} bytes)")]
    PageTooLarge { bytes: u64 },
}

impl TransportError {
    /// Whether a bounded retry is worthwhile.
    ///
    /// Timeouts and network failures are transient. Other variants are
    /// terminal unless their message text indicates a connection problem.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Http { message, .. } => {
                let lower = message.to_ascii_lowercase();
                lower.contains("timeout")
                    || lower.contains("network")
                    || lower.contains("connection")
            }
            _ => false,
        }
    }

    /// Classifies a non-success HTTP status, preferring the remote's own
    /// error message for statuses without a dedicated variant.
    #[must_use]
    pub fn from_status(status: u16, remote_message: Option<String>) -> Self {
        match status {
            401 => Self::InvalidCredential,
            429 => Self::RateLimited,
            s if s >= 500 => Self::RemoteServer { status: s },
            s => Self::Http {
                status: s,
                message: remote_message.unwrap_or_else(|| format!("HTTP {s}")),
            },
        }
    }
}
