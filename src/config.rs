//! Configuration types for blog export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. Every knob lives in one struct so a run can be
//! logged, cloned into the streaming API, or diffed against another run.
//!
//! Durations are plain fields rather than constants so tests can collapse
//! the 1–3 s pacing and the 30 s rate-limit cooldown to zero.

use crate::error::Blog2DocError;
use crate::pipeline::fetch::CancelHandle;
use crate::progress::ProgressCallback;
use crate::source::SourceKind;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Environment variable carrying the Substack `substack.sid` cookie.
pub const ENV_SUBSTACK_SID: &str = "SUBSTACK_SID";
/// Environment variable carrying the Substack `substack.lli` cookie.
pub const ENV_SUBSTACK_LLI: &str = "SUBSTACK_LLI";

/// Configuration for one export run.
///
/// Built via [`ExportConfig::builder()`].
///
/// # Example
/// ```rust
/// use blog2doc::{ExportConfig, SourceKind};
///
/// let config = ExportConfig::builder("https://example.substack.com", SourceKind::Substack)
///     .title("Collected Essays")
///     .author("A. Writer")
///     .build()
///     .unwrap();
/// assert_eq!(config.page_size, 12);
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Blog front page (WordPress) or publication root (Substack).
    pub start_url: Url,

    /// Which adapter crawls `start_url`.
    pub source: SourceKind,

    /// Session tokens, attached only by the Substack adapter.
    pub credentials: Credentials,

    /// Document title override. Default: first post's title.
    pub title: Option<String>,

    /// Author override. Default: "Unknown".
    pub author: Option<String>,

    /// Cover image (URL or local path). Default: first image in the posts.
    pub cover_image: Option<String>,

    /// Items per archive API page. Default: 12.
    ///
    /// Pagination ends on the first page returning fewer items than this.
    pub page_size: usize,

    /// Lower bound of the random pre-request pause. Default: 1 s.
    pub jitter_min: Duration,

    /// Upper bound of the random pre-request pause. Default: 3 s.
    pub jitter_max: Duration,

    /// Fixed wait after an HTTP 429 before the same request is retried. Default: 30 s.
    pub rate_limit_cooldown: Duration,

    /// Attempt cap for individual post pages. Default: 3.
    pub item_max_attempts: u32,

    /// Per-request HTTP timeout. Default: 30 s.
    pub request_timeout: Duration,

    /// Images wider than this are downscaled. Default: 1000 px.
    pub image_max_width: u32,

    /// JPEG quality for cached images (1–100). Default: 80.
    pub jpeg_quality: u8,

    /// Directory for the image cache. Default: a temporary directory that is
    /// removed when the export finishes.
    pub cache_dir: Option<PathBuf>,

    /// Hard wall-clock limit for the whole crawl. Default: none.
    pub run_deadline: Option<Duration>,

    /// Cooperative cancellation, checked before every request.
    pub cancel: CancelHandle,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Optional progress events sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("start_url", &self.start_url.as_str())
            .field("source", &self.source)
            .field("credentials", &self.credentials)
            .field("title", &self.title)
            .field("author", &self.author)
            .field("cover_image", &self.cover_image)
            .field("page_size", &self.page_size)
            .field("jitter_min", &self.jitter_min)
            .field("jitter_max", &self.jitter_max)
            .field("rate_limit_cooldown", &self.rate_limit_cooldown)
            .field("item_max_attempts", &self.item_max_attempts)
            .field("image_max_width", &self.image_max_width)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("cache_dir", &self.cache_dir)
            .field("run_deadline", &self.run_deadline)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a builder for the given start URL and source kind.
    ///
    /// The URL is parsed and validated in [`ExportConfigBuilder::build`].
    pub fn builder(start_url: impl Into<String>, source: SourceKind) -> ExportConfigBuilder {
        ExportConfigBuilder {
            start_url: start_url.into(),
            source,
            credentials: Credentials::default(),
            title: None,
            author: None,
            cover_image: None,
            page_size: 12,
            jitter_min: Duration::from_secs(1),
            jitter_max: Duration::from_secs(3),
            rate_limit_cooldown: Duration::from_secs(30),
            item_max_attempts: 3,
            request_timeout: Duration::from_secs(30),
            image_max_width: 1000,
            jpeg_quality: 80,
            cache_dir: None,
            run_deadline: None,
            cancel: CancelHandle::new(),
            user_agent: concat!("blog2doc/", env!("CARGO_PKG_VERSION")).to_string(),
            progress_callback: None,
        }
    }

    /// The start URL without a trailing slash, as used to build API paths.
    pub fn base_url(&self) -> &str {
        self.start_url.as_str().trim_end_matches('/')
    }
}

/// Builder for [`ExportConfig`].
pub struct ExportConfigBuilder {
    start_url: String,
    source: SourceKind,
    credentials: Credentials,
    title: Option<String>,
    author: Option<String>,
    cover_image: Option<String>,
    page_size: usize,
    jitter_min: Duration,
    jitter_max: Duration,
    rate_limit_cooldown: Duration,
    item_max_attempts: u32,
    request_timeout: Duration,
    image_max_width: u32,
    jpeg_quality: u8,
    cache_dir: Option<PathBuf>,
    run_deadline: Option<Duration>,
    cancel: CancelHandle,
    user_agent: String,
    progress_callback: Option<ProgressCallback>,
}

impl ExportConfigBuilder {
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn cover_image(mut self, cover: impl Into<String>) -> Self {
        self.cover_image = Some(cover.into());
        self
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = n;
        self
    }

    /// Set the random pre-request pause range.
    pub fn jitter(mut self, min: Duration, max: Duration) -> Self {
        self.jitter_min = min;
        self.jitter_max = max;
        self
    }

    pub fn rate_limit_cooldown(mut self, d: Duration) -> Self {
        self.rate_limit_cooldown = d;
        self
    }

    pub fn item_max_attempts(mut self, n: u32) -> Self {
        self.item_max_attempts = n;
        self
    }

    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.request_timeout = d;
        self
    }

    pub fn image_max_width(mut self, px: u32) -> Self {
        self.image_max_width = px;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.jpeg_quality = q;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn run_deadline(mut self, d: Duration) -> Self {
        self.run_deadline = Some(d);
        self
    }

    /// Share an existing cancel handle (e.g. one wired to Ctrl-C).
    pub fn cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, Blog2DocError> {
        let start_url = parse_start_url(&self.start_url)?;

        if self.page_size == 0 {
            return Err(Blog2DocError::InvalidConfig("page size must be ≥ 1".into()));
        }
        if self.jitter_min > self.jitter_max {
            return Err(Blog2DocError::InvalidConfig(format!(
                "jitter minimum {:?} exceeds maximum {:?}",
                self.jitter_min, self.jitter_max
            )));
        }
        if self.item_max_attempts == 0 {
            return Err(Blog2DocError::InvalidConfig(
                "item attempts must be ≥ 1".into(),
            ));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(Blog2DocError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                self.jpeg_quality
            )));
        }
        if self.image_max_width == 0 {
            return Err(Blog2DocError::InvalidConfig(
                "image max width must be ≥ 1".into(),
            ));
        }

        Ok(ExportConfig {
            start_url,
            source: self.source,
            credentials: self.credentials,
            title: self.title,
            author: self.author,
            cover_image: self.cover_image,
            page_size: self.page_size,
            jitter_min: self.jitter_min,
            jitter_max: self.jitter_max,
            rate_limit_cooldown: self.rate_limit_cooldown,
            item_max_attempts: self.item_max_attempts,
            request_timeout: self.request_timeout,
            image_max_width: self.image_max_width,
            jpeg_quality: self.jpeg_quality,
            cache_dir: self.cache_dir,
            run_deadline: self.run_deadline,
            cancel: self.cancel,
            user_agent: self.user_agent,
            progress_callback: self.progress_callback,
        })
    }
}

fn parse_start_url(input: &str) -> Result<Url, Blog2DocError> {
    let url = Url::parse(input.trim()).map_err(|e| Blog2DocError::InvalidStartUrl {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Blog2DocError::InvalidStartUrl {
            input: input.to_string(),
            reason: format!("scheme must be http or https, got '{other}'"),
        }),
    }
}

// ── Credentials ──────────────────────────────────────────────────────────

/// Pre-obtained Substack session tokens.
///
/// Both tokens must be present for the session to count; a half-configured
/// pair is treated as anonymous. Paywalled posts then come back truncated,
/// which is not an error.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub sid: Option<String>,
    pub lli: Option<String>,
}

impl Credentials {
    pub fn new(sid: impl Into<String>, lli: impl Into<String>) -> Self {
        Self {
            sid: Some(sid.into()),
            lli: Some(lli.into()),
        }
    }

    /// Read `SUBSTACK_SID` / `SUBSTACK_LLI` from the environment.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            sid: read(ENV_SUBSTACK_SID),
            lli: read(ENV_SUBSTACK_LLI),
        }
    }

    /// Cookie pairs to attach, or `None` for an anonymous session.
    pub fn cookie_pairs(&self) -> Option<[(&'static str, &str); 2]> {
        match (self.sid.as_deref(), self.lli.as_deref()) {
            (Some(sid), Some(lli)) => Some([("substack.sid", sid), ("substack.lli", lli)]),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.cookie_pairs().is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("sid", &mask(&self.sid))
            .field("lli", &mask(&self.lli))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_crawl_policy() {
        let c = ExportConfig::builder("https://blog.example.com", SourceKind::WordPress)
            .build()
            .unwrap();
        assert_eq!(c.page_size, 12);
        assert_eq!(c.jitter_min, Duration::from_secs(1));
        assert_eq!(c.jitter_max, Duration::from_secs(3));
        assert_eq!(c.rate_limit_cooldown, Duration::from_secs(30));
        assert_eq!(c.item_max_attempts, 3);
        assert_eq!(c.image_max_width, 1000);
        assert_eq!(c.jpeg_quality, 80);
        assert!(c.run_deadline.is_none());
    }

    #[test]
    fn rejects_non_http_start_url() {
        let err = ExportConfig::builder("ftp://blog.example.com", SourceKind::WordPress)
            .build()
            .unwrap_err();
        assert!(matches!(err, Blog2DocError::InvalidStartUrl { .. }));
    }

    #[test]
    fn rejects_relative_start_url() {
        let err = ExportConfig::builder("blog.example.com", SourceKind::Substack)
            .build()
            .unwrap_err();
        assert!(matches!(err, Blog2DocError::InvalidStartUrl { .. }));
    }

    #[test]
    fn rejects_inverted_jitter() {
        let err = ExportConfig::builder("https://a.example", SourceKind::Substack)
            .jitter(Duration::from_secs(3), Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, Blog2DocError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_quality_and_page_size() {
        assert!(ExportConfig::builder("https://a.example", SourceKind::Substack)
            .jpeg_quality(0)
            .build()
            .is_err());
        assert!(ExportConfig::builder("https://a.example", SourceKind::Substack)
            .page_size(0)
            .build()
            .is_err());
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let c = ExportConfig::builder("https://a.substack.com/", SourceKind::Substack)
            .build()
            .unwrap();
        assert_eq!(c.base_url(), "https://a.substack.com");
    }

    #[test]
    fn half_credentials_are_anonymous() {
        let c = Credentials {
            sid: Some("s".into()),
            lli: None,
        };
        assert!(!c.is_authenticated());
        assert!(Credentials::new("s", "l").is_authenticated());
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let dbg = format!("{:?}", Credentials::new("secret-sid", "secret-lli"));
        assert!(!dbg.contains("secret"), "got: {dbg}");
    }
}
