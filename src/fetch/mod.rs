//! HTTP retrieval for machine-readable files
//!
//! The fetcher hands back decompressed byte streams; it never buffers a
//! whole file. Errors split into transient (worth retrying) and permanent
//! (skip the resource); retries happen inside the fetcher, so a returned
//! transient error means the retry budget is already spent.

mod client;

pub use client::Fetcher;

use tokio::io::AsyncRead;

/// Decompressed byte stream of one remote file.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Metadata from a HEAD probe.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    pub size: Option<u64>,
    pub content_encoding: Option<String>,
}

/// Error type for fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Worth retrying: transport failures, timeouts, HTTP 429/5xx.
    #[error("transient fetch failure for {url}: {reason}")]
    Transient { url: String, reason: String },

    /// Not worth retrying: other HTTP errors, unusable URLs.
    #[error("permanent fetch failure for {url}: {reason}")]
    Permanent { url: String, reason: String },

    /// The run's cancellation signal fired mid-request.
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
