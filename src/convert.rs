//! Eager (whole-blog) export entry points.
//!
//! This module provides the simple API: crawl everything, then build and
//! render both variants. Use [`crate::stream::crawl_stream`] instead when you
//! want raw posts as they arrive.
//!
//! ## Run shape
//!
//! ```text
//! fetcher + adapter ─▶ crawl (normalize each post) ─▶ assemble
//!     ─▶ illustrate (image cache) ─▶ render   "with images"
//!     ─▶ strip images            ─▶ render   "without images"
//! ```
//!
//! The image cache is opened before the first request and dropped after the
//! second render, so a temporary cache is removed on every exit path.

use crate::config::ExportConfig;
use crate::error::Blog2DocError;
use crate::output::{Document, ExportOutput, ExportStats, Post, Variant, WrittenFiles};
use crate::pipeline::assemble::{self, Overrides};
use crate::pipeline::images::{ImageCache, ImageRewriter};
use crate::pipeline::normalize;
use crate::pipeline::render::{HtmlRenderer, Renderer};
use crate::source::SourceAdapter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Export a blog with the built-in [`HtmlRenderer`].
///
/// # Returns
/// `Ok(ExportOutput)` when at least one post had content, even if other
/// posts or images failed (see `output.stats`).
///
/// # Errors
/// Returns `Err(Blog2DocError)` only for fatal errors:
/// - the image cache directory cannot be created
/// - no post with content was collected (`NoPosts`, or `Cancelled` /
///   `DeadlineExceeded` when the run was stopped)
/// - the renderer failed
pub async fn export(config: &ExportConfig) -> Result<ExportOutput, Blog2DocError> {
    export_with(config, Arc::new(HtmlRenderer::new())).await
}

/// Export a blog with an injected renderer.
///
/// Each variant is rendered on the blocking pool, so a renderer may do
/// synchronous file or CPU work freely.
pub async fn export_with(
    config: &ExportConfig,
    renderer: Arc<dyn Renderer>,
) -> Result<ExportOutput, Blog2DocError> {
    let total_start = Instant::now();
    info!("Starting export: {} ({})", config.start_url, config.source);

    // ── Step 1: Fetcher, adapter, cache ──────────────────────────────────
    let fetcher = config.source.fetcher(config)?;
    let adapter = config.source.adapter(fetcher.clone(), config);
    let cache = ImageCache::open(config.cache_dir.as_deref())?;
    debug!("Image cache at {}", cache.dir().display());

    if let Some(ref cb) = config.progress_callback {
        cb.on_crawl_start(config.start_url.as_str(), config.source);
    }

    // ── Step 2: Crawl and normalize ──────────────────────────────────────
    let posts = collect_posts(adapter.as_ref(), config).await;
    let discovered = posts.len();

    if !posts.iter().any(Post::has_content) {
        return Err(stopped_reason(config, total_start));
    }
    if config.cancel.is_cancelled() {
        warn!("Export cancelled; building documents from {} collected posts", discovered);
    }

    // ── Step 3: Assemble ─────────────────────────────────────────────────
    let overrides = Overrides {
        title: config.title.as_deref(),
        author: config.author.as_deref(),
        cover_image: config.cover_image.as_deref(),
    };
    let doc = assemble::assemble(posts, adapter.discovery_order(), &overrides);
    let kept = doc.posts.len();

    // ── Step 4: Illustrated variant ──────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_variant_start(Variant::Illustrated, kept);
    }
    let mut rewriter = ImageRewriter::new(
        fetcher.clone(),
        &cache,
        config.image_max_width,
        config.jpeg_quality,
    );
    let illustrated_doc = assemble::illustrate(&doc, &mut rewriter).await;
    let illustrated_doc = Arc::new(illustrated_doc);
    let illustrated =
        render_variant(renderer.clone(), illustrated_doc.clone(), Variant::Illustrated).await?;
    info!(
        "Illustrated variant: {} images cached, {} left remote",
        rewriter.cached_images(),
        rewriter.failed_images()
    );

    // ── Step 5: Text-only variant ────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_variant_start(Variant::TextOnly, kept);
    }
    let text_only = render_variant(
        renderer,
        Arc::new(assemble::text_only(&doc)),
        Variant::TextOnly,
    )
    .await?;

    // ── Step 6: Stats ────────────────────────────────────────────────────
    let stats = ExportStats {
        discovered_posts: discovered,
        kept_posts: kept,
        cached_images: rewriter.cached_images(),
        failed_images: rewriter.failed_images(),
        fetch: fetcher.stats(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Export complete: {}/{} posts, {} requests, {}ms total",
        kept, discovered, stats.fetch.requests, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(&stats);
    }

    Ok(ExportOutput {
        illustrated,
        text_only,
        document: Arc::unwrap_or_clone(illustrated_doc),
        stats,
    })
}

/// Export a blog and write both variants into `out_dir`.
///
/// Files are named `<stem>_with_images.<ext>` and `<stem>_without_images.<ext>`
/// and written atomically (temp file + rename), so a failed run never leaves
/// a truncated book behind. Without an explicit `stem`, it is built from the
/// document's title and author (see [`file_stem`]).
pub async fn export_to_dir(
    config: &ExportConfig,
    out_dir: impl AsRef<Path>,
    stem: Option<&str>,
) -> Result<WrittenFiles, Blog2DocError> {
    export_to_dir_with(config, Arc::new(HtmlRenderer::new()), out_dir, stem).await
}

/// [`export_to_dir`] with an injected renderer.
pub async fn export_to_dir_with(
    config: &ExportConfig,
    renderer: Arc<dyn Renderer>,
    out_dir: impl AsRef<Path>,
    stem: Option<&str>,
) -> Result<WrittenFiles, Blog2DocError> {
    let extension = renderer.extension().to_string();
    let output = export_with(config, renderer).await?;
    let out_dir = out_dir.as_ref();
    let stem = match stem {
        Some(s) => s.to_string(),
        None => file_stem(
            &output.document.title,
            output.document.author.as_deref().unwrap_or(assemble::DEFAULT_AUTHOR),
        ),
    };
    let stem = stem.as_str();

    let illustrated = output_path(out_dir, stem, Variant::Illustrated, &extension);
    let text_only = output_path(out_dir, stem, Variant::TextOnly, &extension);
    write_atomic(&illustrated, &output.illustrated).await?;
    write_atomic(&text_only, &output.text_only).await?;
    info!("Wrote {} and {}", illustrated.display(), text_only.display());

    Ok(WrittenFiles {
        illustrated,
        text_only,
        stats: output.stats,
    })
}

/// Synchronous wrapper around [`export`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_sync(config: &ExportConfig) -> Result<ExportOutput, Blog2DocError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Blog2DocError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export(config))
}

/// `<title>_<author>` made safe for file names.
pub fn file_stem(title: &str, author: &str) -> String {
    format!("{}_{}", sanitize_filename(title), sanitize_filename(author))
}

/// Drop characters invalid in file names, spaces to underscores, collapse
/// runs of underscores, trim them from the ends, cap at 100 characters.
pub fn sanitize_filename(text: &str) -> String {
    static RE_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    RE_UNDERSCORES
        .replace_all(&cleaned, "_")
        .trim_matches('_')
        .chars()
        .take(100)
        .collect()
}

/// `<out_dir>/<stem>_<suffix>.<ext>`.
pub fn output_path(out_dir: &Path, stem: &str, variant: Variant, ext: &str) -> PathBuf {
    out_dir.join(format!("{stem}_{}.{ext}", variant.file_suffix()))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Drain the adapter, normalizing each post with content as it arrives.
async fn collect_posts(adapter: &dyn SourceAdapter, config: &ExportConfig) -> Vec<Post> {
    let kind = adapter.kind();
    let mut stream = adapter.posts();
    let mut posts = Vec::new();

    while let Some(mut post) = stream.next().await {
        let index = posts.len() + 1;
        if post.has_content() {
            let base = Url::parse(&post.url).unwrap_or_else(|_| config.start_url.clone());
            post.content = normalize::normalize(&post.content, &base, kind, Variant::Illustrated);
            info!("#{} {}", index, post.title);
            if let Some(ref cb) = config.progress_callback {
                cb.on_post_fetched(index, &post.title, &post.url);
            }
        } else {
            debug!("#{} {} has no content", index, post.url);
            if let Some(ref cb) = config.progress_callback {
                cb.on_post_failed(index, &post.url);
            }
        }
        posts.push(post);
    }
    posts
}

/// Why a crawl produced nothing.
fn stopped_reason(config: &ExportConfig, started: Instant) -> Blog2DocError {
    if config.cancel.is_cancelled() {
        return Blog2DocError::Cancelled;
    }
    if let Some(deadline) = config.run_deadline {
        if started.elapsed() >= deadline {
            return Blog2DocError::DeadlineExceeded {
                secs: deadline.as_secs(),
            };
        }
    }
    Blog2DocError::NoPosts {
        url: config.start_url.to_string(),
    }
}

/// Render one variant on the blocking pool.
async fn render_variant(
    renderer: Arc<dyn Renderer>,
    doc: Arc<Document>,
    variant: Variant,
) -> Result<Vec<u8>, Blog2DocError> {
    let result = tokio::task::spawn_blocking(move || renderer.render(&doc).map_err(|e| e.to_string()))
        .await
        .map_err(|e| Blog2DocError::Internal(format!("Render task panicked: {}", e)))?;
    let bytes = result.map_err(|detail| Blog2DocError::RenderFailed {
        variant: variant.to_string(),
        detail,
    })?;
    debug!("Rendered {} variant: {} bytes", variant, bytes.len());
    Ok(bytes)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Blog2DocError> {
    let fail = |source| Blog2DocError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp, path).await.map_err(fail)
}
