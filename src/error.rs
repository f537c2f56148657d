//! Error types for the blog2doc library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`Blog2DocError`] — **Fatal**: the export cannot proceed at all
//!   (bad start URL, invalid configuration, cache directory unusable,
//!   renderer failure). Returned as `Err(Blog2DocError)` from the top-level
//!   `export*` functions.
//!
//! * [`FetchError`] — **Per-request**: one HTTP GET failed. Listing pages
//!   end their pagination loop on it, item pages turn it into an empty post.
//!   It never aborts the run on its own.
//!
//! * [`ImageError`] — **Per-image**: one image could not be downloaded or
//!   transcoded. The rewriter logs it and leaves that `<img>` pointing at its
//!   original remote URL.
//!
//! Missing structural elements (no title, no content container) are not
//! errors at all; extractors fall back to defaults instead.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the blog2doc library.
#[derive(Debug, Error)]
pub enum Blog2DocError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The start URL is not an absolute HTTP/HTTPS URL.
    #[error("Invalid start URL '{input}': {reason}")]
    InvalidStartUrl { input: String, reason: String },

    /// Unknown source kind name (CLI / config files).
    #[error("Unknown source kind '{0}' (expected 'wordpress' or 'substack')")]
    UnknownSourceKind(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Run control ───────────────────────────────────────────────────────
    /// The crawl was cancelled before any post was collected.
    #[error("Export cancelled")]
    Cancelled,

    /// The run deadline elapsed before any post was collected.
    #[error("Run deadline of {secs}s exceeded")]
    DeadlineExceeded { secs: u64 },

    /// The crawl finished but produced no post with content.
    #[error("No posts with content were found at '{url}'")]
    NoPosts { url: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The image cache directory could not be created.
    #[error("Failed to prepare image cache directory '{path}': {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The injected renderer rejected the document.
    #[error("Rendering the {variant} variant failed: {detail}")]
    RenderFailed { variant: String, detail: String },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed HTTP GET, classified for retry decisions.
///
/// HTTP 429 never appears here: the fetcher always sleeps through the
/// cooldown and retries the same request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, connection failure or 5xx. Retried under the bounded posture.
    #[error("Transient failure fetching '{url}': {reason}")]
    Transient { url: String, reason: String },

    /// 4xx other than 429. Never retried.
    #[error("HTTP {status} fetching '{url}'")]
    Permanent { url: String, status: u16 },

    /// The cancel handle was triggered.
    #[error("Fetch of '{url}' cancelled")]
    Cancelled { url: String },

    /// The run deadline elapsed.
    #[error("Run deadline exceeded before fetching '{url}'")]
    DeadlineExceeded { url: String },
}

impl FetchError {
    /// Whether a caller with retry budget left should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    /// Whether the whole run should stop issuing requests.
    pub fn is_run_stop(&self) -> bool {
        matches!(
            self,
            FetchError::Cancelled { .. } | FetchError::DeadlineExceeded { .. }
        )
    }
}

/// A non-fatal failure while caching a single image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("download failed: {0}")]
    Download(#[from] FetchError),

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("cache write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcode task panicked: {0}")]
    Task(String),
}
