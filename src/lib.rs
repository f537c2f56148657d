//! # blog2doc
//!
//! Crawl a WordPress or Substack blog into an ordered, offline-readable book.
//!
//! ## Why this crate?
//!
//! Reading a blog's back catalogue means paging through archives, dodging
//! share widgets and subscribe boxes, and losing images the moment you go
//! offline. This crate crawls the whole archive politely (one request at a
//! time, randomised pacing, 429 backoff), strips the site chrome, caches and
//! downsizes every image, and hands a clean, chronologically ordered
//! document to a renderer, twice: once with images and once without.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Blog URL
//!  │
//!  ├─ 1. Crawl      WordPress listing pages or Substack archive API
//!  ├─ 2. Fetch      each post page (bounded retries, 429 cooldown)
//!  ├─ 3. Normalize  per-source chrome removal, image-link unwrapping
//!  ├─ 4. Assemble   drop empties, oldest first, title/author/cover
//!  ├─ 5. Images     download → flatten → resize → JPEG, content-addressed
//!  └─ 6. Render     illustrated + text-only documents
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blog2doc::{export_to_dir, ExportConfig, SourceKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExportConfig::builder("https://example.substack.com", SourceKind::Substack)
//!         .author("A. Writer")
//!         .build()?;
//!     let written = export_to_dir(&config, "output", Some("Example")).await?;
//!     println!("{}", written.illustrated.display());
//!     eprintln!("{} posts, {} requests",
//!         written.stats.kept_posts,
//!         written.stats.fetch.requests);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `blog2doc` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! blog2doc = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod source;
pub mod stream;
pub mod templates;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credentials, ExportConfig, ExportConfigBuilder};
pub use convert::{
    export, export_sync, export_to_dir, export_to_dir_with, export_with, file_stem,
};
pub use error::{Blog2DocError, FetchError, ImageError};
pub use output::{Document, ExportOutput, ExportStats, Post, Variant, WrittenFiles};
pub use pipeline::fetch::{CancelHandle, FetchStats, Fetcher, Posture};
pub use pipeline::images::{ImageCache, ImageRewriter};
pub use pipeline::render::{HtmlRenderer, RenderError, Renderer};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use source::{DiscoveryOrder, PostStream, SourceAdapter, SourceKind};
pub use stream::{crawl_stream, normalized_stream};
