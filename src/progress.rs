//! Progress-callback trait for crawl and render events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to follow a run
//! as posts arrive. A crawl with default pacing takes 1–3 s per request, so
//! anything interactive wants these events.
//!
//! # Example
//!
//! ```rust
//! use blog2doc::{ExportConfig, ExportProgressCallback, SourceKind};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     fetched: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for CountingCallback {
//!     fn on_post_fetched(&self, index: usize, title: &str, _url: &str) {
//!         self.fetched.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("#{index}: {title}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { fetched: AtomicUsize::new(0) });
//!
//! let config = ExportConfig::builder("https://example.substack.com", SourceKind::Substack)
//!     .progress_callback(counter as Arc<dyn ExportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{ExportStats, Variant};
use crate::source::SourceKind;
use std::sync::Arc;

/// Called by the export pipeline as it crawls and renders.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive from the task driving the export, one
/// at a time.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once before the first request.
    fn on_crawl_start(&self, start_url: &str, source: SourceKind) {
        let _ = (start_url, source);
    }

    /// Called for every post that came back with content.
    ///
    /// # Arguments
    /// * `index` — 1-indexed position in discovery order
    fn on_post_fetched(&self, index: usize, title: &str, url: &str) {
        let _ = (index, title, url);
    }

    /// Called for every post whose page could not be retrieved (it will be
    /// left out of the documents).
    fn on_post_failed(&self, index: usize, url: &str) {
        let _ = (index, url);
    }

    /// Called before a variant is built and rendered.
    fn on_variant_start(&self, variant: Variant, posts: usize) {
        let _ = (variant, posts);
    }

    /// Called once after both variants are rendered.
    fn on_export_complete(&self, stats: &ExportStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;
