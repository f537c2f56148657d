//! Image rewriting: download, transcode and localise every `<img>` in a post.
//!
//! Cache entries are keyed by the SHA-256 of the absolute image URL, so the
//! same URL always lands at `{cache_dir}/{key}.jpg` no matter how often or
//! where it is referenced. A file already present is reused without touching
//! the network; that is what keeps a long crawl with repeated avatars and
//! banners cheap.
//!
//! ## Per-image isolation
//!
//! Any failure (download, decode, write) is logged and the `<img>` keeps its
//! original remote `src`. One broken image never affects the rest of the
//! document.
//!
//! ## Why spawn_blocking?
//!
//! Decoding, Lanczos resampling and JPEG encoding are CPU-bound and can take
//! tens of milliseconds for a large photo. They run on the blocking pool so
//! the crawl's timers (pacing, cooldown, deadline) stay responsive.

use crate::error::{Blog2DocError, ImageError};
use crate::pipeline::dom::{self, Fragment};
use crate::pipeline::fetch::{Fetcher, Posture};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use scraper::ElementRef;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use url::Url;

// ── Cache ────────────────────────────────────────────────────────────────

/// Content-addressed image directory for one run.
///
/// A temporary cache deletes itself on drop, on success and on error alike.
/// A cache opened with [`at`](Self::at) belongs to the caller and survives.
#[derive(Debug)]
pub struct ImageCache {
    dir: PathBuf,
    _temp: Option<TempDir>,
}

impl ImageCache {
    /// A fresh cache under the system temp directory.
    pub fn temporary() -> Result<Self, Blog2DocError> {
        let temp = tempfile::Builder::new()
            .prefix("blog2doc-images-")
            .tempdir()
            .map_err(|source| Blog2DocError::CacheDir {
                path: std::env::temp_dir(),
                source,
            })?;
        Ok(Self {
            dir: temp.path().to_path_buf(),
            _temp: Some(temp),
        })
    }

    /// A cache in `dir`, created if missing.
    pub fn at(dir: impl Into<PathBuf>) -> Result<Self, Blog2DocError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| Blog2DocError::CacheDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, _temp: None })
    }

    /// `at(dir)` when a directory is configured, otherwise `temporary()`.
    pub fn open(dir: Option<&Path>) -> Result<Self, Blog2DocError> {
        match dir {
            Some(dir) => Self::at(dir),
            None => Self::temporary(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hex SHA-256 of the absolute URL.
    pub fn key_for(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.jpg"))
    }

    /// Number of finished `.jpg` entries on disk.
    pub fn len(&self) -> usize {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "jpg"))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `file://` URL for a cached image, as written into `src`.
pub fn local_ref(path: &Path) -> String {
    let abs = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    Url::from_file_path(&abs)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("file://{}", abs.display()))
}

// ── Assets ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Missing,
    Downloading,
    Ready,
    Failed,
}

/// One referenced image URL and where it lives in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub source_url: String,
    pub cache_key: String,
    pub local_path: PathBuf,
    pub state: AssetState,
}

// ── Rewriter ─────────────────────────────────────────────────────────────

/// Rewrites `<img>` references to point into an [`ImageCache`].
///
/// Remembers every URL it has seen during the run, so a failed download is
/// not retried for each post that embeds the same image.
pub struct ImageRewriter<'c> {
    fetcher: Fetcher,
    cache: &'c ImageCache,
    max_width: u32,
    quality: u8,
    assets: HashMap<String, ImageAsset>,
    failed_refs: usize,
}

impl<'c> ImageRewriter<'c> {
    pub fn new(fetcher: Fetcher, cache: &'c ImageCache, max_width: u32, quality: u8) -> Self {
        Self {
            fetcher,
            cache,
            max_width,
            quality,
            assets: HashMap::new(),
            failed_refs: 0,
        }
    }

    /// Localise every `<img src>` in `html`, resolving relative URLs against `base`.
    ///
    /// Successful images get a `file://` `src` and lose their `srcset`.
    /// Images already pointing at a local file, or at a `data:` URI, are left
    /// alone, so a second pass is a no-op.
    pub async fn rewrite_images(&mut self, html: &str, base: &Url) -> String {
        let sources = Fragment::parse(html).all_attrs("img", "src");

        let mut local: HashMap<String, String> = HashMap::new();
        let mut remote: Vec<String> = Vec::new();
        for src in sources {
            if local.contains_key(&src) || remote.contains(&src) {
                continue;
            }
            let Some(abs) = resolve(base, &src) else {
                continue;
            };
            match self.ensure(abs.as_str()).await {
                Some(path) => {
                    local.insert(src, local_ref(&path));
                }
                None => remote.push(src),
            }
        }

        let mut failed = 0usize;
        let out = dom::rewrite_start_tags(html, "img", |attrs| {
            let Some(src) = attrs.get("src").map(str::to_string) else {
                return false;
            };
            match local.get(&src) {
                Some(local_src) => {
                    attrs.set("src", local_src.clone());
                    attrs.remove("srcset");
                    true
                }
                None => {
                    if remote.contains(&src) {
                        failed += 1;
                    }
                    false
                }
            }
        });
        self.failed_refs += failed;
        if local.is_empty() {
            out
        } else {
            drop_picture_sources(&out)
        }
    }

    /// Localise a single reference (the cover image).
    ///
    /// Relative references are resolved against `base` when one is given;
    /// without a base they are taken as filesystem paths. Remote URLs go
    /// through the cache; anything else, and any failure, comes back as given.
    pub async fn localize(&mut self, reference: &str, base: Option<&Url>) -> String {
        let abs = match (Url::parse(reference.trim()), base) {
            (Ok(url), _) => Some(url),
            (Err(_), Some(base)) => base.join(reference.trim()).ok(),
            (Err(_), None) => {
                let path = Path::new(reference);
                return if path.is_file() {
                    local_ref(path)
                } else {
                    reference.to_string()
                };
            }
        };
        let Some(abs) = abs.filter(|u| matches!(u.scheme(), "http" | "https")) else {
            return reference.to_string();
        };
        match self.ensure(abs.as_str()).await {
            Some(path) => local_ref(&path),
            None => reference.to_string(),
        }
    }

    /// Distinct URLs now available locally.
    pub fn cached_images(&self) -> usize {
        self.assets
            .values()
            .filter(|a| a.state == AssetState::Ready)
            .count()
    }

    /// `<img>` elements left pointing at a remote URL after a failure.
    pub fn failed_images(&self) -> usize {
        self.failed_refs
    }

    pub fn asset(&self, url: &str) -> Option<&ImageAsset> {
        self.assets.get(url)
    }

    /// Make sure `url` is cached, returning its path.
    async fn ensure(&mut self, url: &str) -> Option<PathBuf> {
        let key = ImageCache::key_for(url);
        let path = self.cache.path_for(&key);
        let state = self
            .assets
            .entry(url.to_string())
            .or_insert_with(|| ImageAsset {
                source_url: url.to_string(),
                cache_key: key,
                local_path: path.clone(),
                state: AssetState::Missing,
            })
            .state;

        match state {
            AssetState::Ready => return Some(path),
            AssetState::Failed => return None,
            AssetState::Missing | AssetState::Downloading => {}
        }

        if path.is_file() {
            debug!("Image cache hit for {}", url);
            self.set_state(url, AssetState::Ready);
            return Some(path);
        }

        self.set_state(url, AssetState::Downloading);
        match cache_image(&self.fetcher, url, &path, self.max_width, self.quality).await {
            Ok(()) => {
                debug!("Cached {} → {}", url, path.display());
                self.set_state(url, AssetState::Ready);
                Some(path)
            }
            Err(e) => {
                warn!("Failed to process image {}: {}", url, e);
                self.set_state(url, AssetState::Failed);
                None
            }
        }
    }

    fn set_state(&mut self, url: &str, state: AssetState) {
        if let Some(asset) = self.assets.get_mut(url) {
            asset.state = state;
        }
    }
}

/// Remove the `<source>` alternatives of every `<picture>` whose `<img>` is
/// now local, so a renderer cannot pick a remote resolution instead.
fn drop_picture_sources(html: &str) -> String {
    if !html.contains("<source") {
        return html.to_string();
    }
    Fragment::parse(html)
        .remove_where("picture > source", |source| {
            source
                .parent()
                .and_then(ElementRef::wrap)
                .is_some_and(dom::contains_local_image)
        })
        .to_html()
}

/// Absolute http(s) URL for an image reference, or `None` to leave it be.
fn resolve(base: &Url, src: &str) -> Option<Url> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    let abs = base.join(src).ok()?;
    matches!(abs.scheme(), "http" | "https").then_some(abs)
}

async fn cache_image(
    fetcher: &Fetcher,
    url: &str,
    path: &Path,
    max_width: u32,
    quality: u8,
) -> Result<(), ImageError> {
    let response = fetcher.fetch(url, Posture::Direct).await?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), ImageError> {
        let jpeg = transcode(&response.body, max_width, quality)?;
        write_atomic(&path, &jpeg)?;
        Ok(())
    })
    .await
    .map_err(|e| ImageError::Task(e.to_string()))?
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("jpg.part");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

// ── Transcoding ──────────────────────────────────────────────────────────

/// Decode any supported format and re-encode as an opaque RGB JPEG.
///
/// Alpha is flattened onto white. Images wider than `max_width` are
/// downscaled with Lanczos3, keeping the aspect ratio.
///
/// The `image` crate's JPEG encoder has no Huffman-table optimisation
/// switch; quality alone controls size.
pub fn transcode(bytes: &[u8], max_width: u32, quality: u8) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory(bytes)?;
    let mut rgb = flatten_onto_white(&img);

    if rgb.width() > max_width {
        let height = (u64::from(rgb.height()) * u64::from(max_width) / u64::from(rgb.width())).max(1) as u32;
        rgb = image::imageops::resize(&rgb, max_width, height, FilterType::Lanczos3);
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = u32::from(px[3]);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    out
}
