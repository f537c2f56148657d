//! End-to-end integration tests for blog2doc.
//!
//! Every test runs a full crawl against a local `wiremock` server standing in
//! for a WordPress blog or a Substack publication, with pacing and the
//! rate-limit cooldown set to zero. Backoffs and retries are checked through
//! the fetcher's counters, not the wall clock.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use blog2doc::{
    export, export_to_dir, export_with, normalized_stream, Blog2DocError, Credentials, Document,
    ExportConfig, ExportProgressCallback, Fetcher, HtmlRenderer, ImageCache, ImageRewriter,
    ProgressCallback, RenderError, Renderer, SourceKind,
};
use futures::StreamExt;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Builder with every sleep collapsed to zero and the cache in `cache_dir`.
fn quick(server: &MockServer, kind: SourceKind, cache_dir: &Path) -> blog2doc::ExportConfigBuilder {
    ExportConfig::builder(server.uri(), kind)
        .jitter(Duration::ZERO, Duration::ZERO)
        .rate_limit_cooldown(Duration::ZERO)
        .request_timeout(Duration::from_secs(5))
        .cache_dir(cache_dir)
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn png_bytes() -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 20, Rgba([200, 10, 10, 128])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn wp_listing(links: &[(&str, &str)], older: Option<&str>) -> String {
    let mut out = String::from("<html><body><main>");
    for (href, title) in links {
        out.push_str(&format!(
            r#"<article><h2 class="entry-title"><a href="{href}">{title}</a></h2><p>Excerpt… Continue reading</p></article>"#
        ));
    }
    if let Some(older) = older {
        out.push_str(&format!(
            r#"<nav><div class="nav-previous"><a href="{older}">Older posts</a></div></nav>"#
        ));
    }
    out.push_str("</main></body></html>");
    out
}

fn wp_post(title: &str, content: &str) -> String {
    format!(
        r#"<html><head><title>{title} – Test Blog</title></head><body>
<article><h1 class="entry-title">{title}</h1><time class="entry-date">2024-01-01</time>
<div class="entry-content">{content}<div class="sharedaddy">Share this</div></div></article>
</body></html>"#
    )
}

fn substack_post(title: &str, content: &str) -> String {
    format!(
        r#"<html><body><h1 class="post-title">{title}</h1>
<div class="available-content"><div class="body markup">{content}
<div class="subscribe-widget">Subscribe now</div></div></div></body></html>"#
    )
}

fn archive(base: &str, slugs: &[&str]) -> serde_json::Value {
    serde_json::Value::Array(
        slugs
            .iter()
            .map(|s| {
                serde_json::json!({
                    "canonical_url": format!("{base}/p/{s}"),
                    "slug": s,
                    "post_date": "2024-01-01T00:00:00.000Z",
                    "title": s,
                })
            })
            .collect(),
    )
}

#[derive(Default)]
struct Counting {
    fetched: AtomicUsize,
    failed: AtomicUsize,
    completed: AtomicUsize,
}

impl ExportProgressCallback for Counting {
    fn on_post_fetched(&self, _index: usize, _title: &str, _url: &str) {
        self.fetched.fetch_add(1, Ordering::SeqCst);
    }

    fn on_post_failed(&self, _index: usize, _url: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_export_complete(&self, _stats: &blog2doc::ExportStats) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

// ── WordPress ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn wordpress_two_listing_pages_oldest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&wp_listing(
            &[("/2024/02/beta/", "Beta"), ("/2024/01/alpha/", "Alpha")],
            Some("/page/2/"),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page/2/"))
        .respond_with(html(&wp_listing(&[("/2023/12/origin/", "Origin")], None)))
        .expect(1)
        .mount(&server)
        .await;
    for (p, title) in [
        ("/2024/02/beta/", "Beta"),
        ("/2024/01/alpha/", "Alpha"),
        ("/2023/12/origin/", "Origin"),
    ] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(html(&wp_post(title, &format!("<p>{title} body</p>"))))
            .expect(1)
            .mount(&server)
            .await;
    }

    let cache = tempfile::tempdir().unwrap();
    let counting = Arc::new(Counting::default());
    let config = quick(&server, SourceKind::WordPress, cache.path())
        .progress_callback(counting.clone() as ProgressCallback)
        .build()
        .unwrap();

    let output = export(&config).await.unwrap();

    let titles: Vec<_> = output.document.posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, ["Origin", "Alpha", "Beta"]);
    assert_eq!(output.document.title, "Origin");
    assert_eq!(output.document.author.as_deref(), Some("Unknown"));
    assert_eq!(output.document.posts[0].date.as_deref(), Some("2024-01-01"));
    assert!(output
        .document
        .posts
        .iter()
        .all(|p| !p.content.contains("sharedaddy")));

    assert_eq!(output.stats.discovered_posts, 3);
    assert_eq!(output.stats.kept_posts, 3);
    assert_eq!(output.stats.fetch.requests, 5);
    assert_eq!(counting.fetched.load(Ordering::SeqCst), 3);
    assert_eq!(counting.completed.load(Ordering::SeqCst), 1);

    let book = String::from_utf8(output.illustrated).unwrap();
    let (o, a, b) = (
        book.find("Origin body").unwrap(),
        book.find("Alpha body").unwrap(),
        book.find("Beta body").unwrap(),
    );
    assert!(o < a && a < b);
}

#[tokio::test]
async fn item_failing_three_times_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&wp_listing(
            &[("/broken/", "Broken"), ("/fine/", "Fine")],
            None,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fine/"))
        .respond_with(html(&wp_post("Fine", "<p>ok</p>")))
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let counting = Arc::new(Counting::default());
    let config = quick(&server, SourceKind::WordPress, cache.path())
        .progress_callback(counting.clone() as ProgressCallback)
        .build()
        .unwrap();

    let output = export(&config).await.unwrap();
    assert_eq!(output.stats.discovered_posts, 2);
    assert_eq!(output.stats.kept_posts, 1);
    assert_eq!(output.stats.fetch.retries, 2);
    assert_eq!(output.stats.fetch.failures, 1);
    assert_eq!(counting.failed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn item_rate_limit_does_not_use_up_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&wp_listing(&[("/busy/", "Busy")], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy/"))
        .respond_with(html(&wp_post("Busy", "<p>made it</p>")))
        .expect(1)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::WordPress, cache.path()).build().unwrap();
    let output = export(&config).await.unwrap();

    assert_eq!(output.stats.kept_posts, 1);
    assert!(output.document.posts[0].content.contains("made it"));
    assert_eq!(output.stats.fetch.rate_limited, 1);
    assert_eq!(output.stats.fetch.retries, 2);
    assert_eq!(output.stats.fetch.failures, 0);
    // Listing + 429 + two 500s + success.
    assert_eq!(output.stats.fetch.requests, 5);
}

#[tokio::test]
async fn not_found_item_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&wp_listing(&[("/gone/", "Gone"), ("/here/", "Here")], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/here/"))
        .respond_with(html(&wp_post("Here", "<p>x</p>")))
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::WordPress, cache.path()).build().unwrap();
    let output = export(&config).await.unwrap();
    assert_eq!(output.stats.kept_posts, 1);
    assert_eq!(output.stats.fetch.retries, 0);
}

#[tokio::test]
async fn failed_listing_with_nothing_collected_is_no_posts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::WordPress, cache.path()).build().unwrap();
    let err = export(&config).await.unwrap_err();
    assert!(matches!(err, Blog2DocError::NoPosts { .. }), "got {err:?}");
}

// ── Substack ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rate_limited_archive_retries_same_request() {
    let server = MockServer::start().await;
    let base = server.uri();
    let slugs = ["five", "four", "three", "two", "one"];

    Mock::given(method("GET"))
        .and(path("/api/v1/archive"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/archive"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(archive(&base, &slugs)))
        .expect(1)
        .mount(&server)
        .await;
    for slug in slugs {
        Mock::given(method("GET"))
            .and(path(format!("/p/{slug}")))
            .respond_with(html(&substack_post(slug, &format!("<p>{slug} text</p>"))))
            .expect(1)
            .mount(&server)
            .await;
    }

    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::Substack, cache.path()).build().unwrap();
    let output = export(&config).await.unwrap();

    assert_eq!(output.stats.fetch.rate_limited, 1);
    assert_eq!(output.stats.kept_posts, 5);
    // Short page (5 < 12) ends pagination: no request for offset 12.
    assert_eq!(output.stats.fetch.requests, 1 + 1 + 5);

    let titles: Vec<_> = output.document.posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, ["one", "two", "three", "four", "five"]);
    assert!(output
        .document
        .posts
        .iter()
        .all(|p| !p.content.contains("subscribe-widget")));
}

#[tokio::test]
async fn archive_paginates_by_offset_until_empty_page() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/api/v1/archive"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(archive(&base, &["b", "a"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/archive"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;
    for slug in ["a", "b"] {
        Mock::given(method("GET"))
            .and(path(format!("/p/{slug}")))
            .respond_with(html(&substack_post(slug, "<p>t</p>")))
            .mount(&server)
            .await;
    }

    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::Substack, cache.path())
        .page_size(2)
        .build()
        .unwrap();
    let output = export(&config).await.unwrap();
    assert_eq!(output.stats.kept_posts, 2);
    assert_eq!(output.document.posts[0].title, "a");
    // The archive date fills in for the missing page date.
    assert_eq!(
        output.document.posts[0].date.as_deref(),
        Some("2024-01-01T00:00:00.000Z")
    );
}

#[tokio::test]
async fn session_cookies_reach_the_publication() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/api/v1/archive"))
        .and(header_regex("cookie", r"substack\.sid=sid-token"))
        .and(header_regex("cookie", r"substack\.lli=lli-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(archive(&base, &["paid"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/paid"))
        .and(header_regex("cookie", r"substack\.sid=sid-token"))
        .respond_with(html(&substack_post("Paid", "<p>full text</p>")))
        .expect(1)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::Substack, cache.path())
        .credentials(Credentials::new("sid-token", "lli-token"))
        .build()
        .unwrap();
    let output = export(&config).await.unwrap();
    assert!(output.document.posts[0].content.contains("full text"));
}

// ── Images ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_image_keeps_remote_reference() {
    let server = MockServer::start().await;
    let base = server.uri();
    let missing = format!("{base}/img/missing.png");

    Mock::given(method("GET"))
        .and(path("/api/v1/archive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(archive(&base, &["pics"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/pics"))
        .respond_with(html(&substack_post(
            "Pics",
            &format!(r#"<p>before</p><img src="{missing}"><p>after</p>"#),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::Substack, cache.path()).build().unwrap();
    let output = export(&config).await.unwrap();

    let content = &output.document.posts[0].content;
    assert!(content.contains(&format!(r#"src="{missing}""#)), "got: {content}");
    assert_eq!(output.stats.failed_images, 1);
    assert_eq!(output.stats.cached_images, 0);
    assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn images_are_cached_unwrapped_and_inlined() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/api/v1/archive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(archive(&base, &["pics"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/pics"))
        .respond_with(html(&substack_post(
            "Pics",
            r#"<figure><a href="/img/full.png"><img src="/img/a.png" srcset="/img/a.png 1x, /img/big.png 2x"></a><figcaption>Caption</figcaption></figure>
<p>again <img src="/img/a.png"></p>"#,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/a.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::Substack, cache.path()).build().unwrap();
    let output = export(&config).await.unwrap();

    let content = &output.document.posts[0].content;
    assert!(!content.contains("<a "), "image link not unwrapped: {content}");
    assert!(!content.contains("srcset"), "srcset kept: {content}");
    assert_eq!(content.matches(r#"src="file://"#).count(), 2, "got: {content}");
    assert_eq!(output.stats.cached_images, 1);

    let key = ImageCache::key_for(&format!("{base}/img/a.png"));
    let cached = cache.path().join(format!("{key}.jpg"));
    let decoded = image::open(&cached).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (40, 20));

    // Cover defaults to the first image, localised through the same cache entry.
    let front = output.document.front_image.as_deref().unwrap();
    assert!(front.starts_with("file://") && front.contains(&key), "got: {front}");

    let book = String::from_utf8(output.illustrated).unwrap();
    assert!(book.contains("data:image/jpeg;base64,"));
    assert!(!book.contains("file://"));

    let plain = String::from_utf8(output.text_only).unwrap();
    assert!(!plain.contains("<img"));
    assert!(!plain.contains("<figure"));
    assert!(!plain.contains("Caption"));
    assert!(plain.contains("again"));
}

#[tokio::test]
async fn warm_cache_second_pass_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::WordPress, dir.path()).build().unwrap();
    let fetcher = Fetcher::new(&config).unwrap();
    let cache = ImageCache::at(dir.path()).unwrap();
    let base = Url::parse(&format!("{}/2024/01/post/", server.uri())).unwrap();
    let html = r#"<p><img src="/img/a.png"></p>"#;

    let first = ImageRewriter::new(fetcher.clone(), &cache, 1000, 80)
        .rewrite_images(html, &base)
        .await;
    let after_first = fetcher.stats().requests;

    let mut again = ImageRewriter::new(fetcher.clone(), &cache, 1000, 80);
    let second = again.rewrite_images(html, &base).await;
    assert_eq!(first, second);
    assert_eq!(fetcher.stats().requests, after_first);
    assert_eq!(after_first, 1);

    // Rewriting already-local output is also offline and stable.
    assert_eq!(again.rewrite_images(&second, &base).await, second);
    assert_eq!(fetcher.stats().requests, 1);
}

// ── Output, streaming, cancellation ──────────────────────────────────────────

/// Records the thread each render runs on, then defers to the HTML renderer.
#[derive(Default)]
struct ThreadRecordingRenderer {
    threads: Mutex<Vec<ThreadId>>,
}

impl Renderer for ThreadRecordingRenderer {
    fn render(&self, doc: &Document) -> Result<Vec<u8>, RenderError> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        HtmlRenderer::new().render(doc)
    }
}

struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(&self, _doc: &Document) -> Result<Vec<u8>, RenderError> {
        Err("out of paper".into())
    }
}

async fn one_post_blog() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&wp_listing(&[("/only/", "Only Post")], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/only/"))
        .respond_with(html(&wp_post("Only Post", "<p>text</p>")))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn rendering_runs_off_the_async_task() {
    let server = one_post_blog().await;
    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::WordPress, cache.path()).build().unwrap();

    let renderer = Arc::new(ThreadRecordingRenderer::default());
    let output = export_with(&config, renderer.clone()).await.unwrap();
    assert!(String::from_utf8(output.text_only).unwrap().contains("Only Post"));

    let threads = renderer.threads.lock().unwrap();
    assert_eq!(threads.len(), 2);
    let here = std::thread::current().id();
    assert!(threads.iter().all(|t| *t != here));
}

#[tokio::test]
async fn renderer_failure_names_the_variant() {
    let server = one_post_blog().await;
    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::WordPress, cache.path()).build().unwrap();

    let err = export_with(&config, Arc::new(FailingRenderer)).await.unwrap_err();
    match err {
        Blog2DocError::RenderFailed { variant, detail } => {
            assert_eq!(variant, "illustrated");
            assert_eq!(detail, "out of paper");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn stats_serialize_with_fetch_counters() {
    let server = one_post_blog().await;
    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::WordPress, cache.path()).build().unwrap();

    let output = export(&config).await.unwrap();
    let json = serde_json::to_value(&output.stats).unwrap();
    assert_eq!(json["fetch"]["requests"], 2);
    assert_eq!(json["fetch"]["rate_limited"], 0);
    assert_eq!(json["kept_posts"], 1);
}

#[tokio::test]
async fn export_to_dir_writes_both_books() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&wp_listing(&[("/only/", "Only Post")], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/only/"))
        .respond_with(html(&wp_post("Only Post", "<p>text</p>")))
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::WordPress, cache.path())
        .author("Jane Doe")
        .build()
        .unwrap();

    let written = export_to_dir(&config, out.path(), None).await.unwrap();
    assert_eq!(
        written.illustrated,
        out.path().join("Only_Post_Jane_Doe_with_images.html")
    );
    assert_eq!(
        written.text_only,
        out.path().join("Only_Post_Jane_Doe_without_images.html")
    );
    let book = std::fs::read_to_string(&written.illustrated).unwrap();
    assert!(book.contains("<title>Only Post</title>"));
    assert!(book.contains("Jane Doe"));
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn normalized_stream_yields_clean_posts_lazily() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&wp_listing(&[("/a/", "A"), ("/b/", "B")], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a/"))
        .respond_with(html(&wp_post("A", r#"<p><a href="/x.jpg"><img src="/x.jpg"></a></p>"#)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/"))
        .respond_with(html(&wp_post("B", "<p>b</p>")))
        .expect(0)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = quick(&server, SourceKind::WordPress, cache.path()).build().unwrap();
    let mut stream = normalized_stream(&config).unwrap();

    let first = stream.next().await.unwrap();
    assert_eq!(first.title, "A");
    assert!(!first.content.contains("<a "));
    assert!(!first.content.contains("sharedaddy"));
    drop(stream);
}

struct CancelAfterFirst {
    cancel: blog2doc::CancelHandle,
}

impl ExportProgressCallback for CancelAfterFirst {
    fn on_post_fetched(&self, _index: usize, _title: &str, _url: &str) {
        self.cancel.cancel();
    }
}

#[tokio::test]
async fn cancellation_keeps_collected_posts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&wp_listing(&[("/a/", "A"), ("/b/", "B")], Some("/page/2/"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a/"))
        .respond_with(html(&wp_post("A", "<p>a</p>")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/"))
        .respond_with(html(&wp_post("B", "<p>b</p>")))
        .expect(0)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let cancel = blog2doc::CancelHandle::new();
    let config = quick(&server, SourceKind::WordPress, cache.path())
        .cancel_handle(cancel.clone())
        .progress_callback(Arc::new(CancelAfterFirst { cancel }) as ProgressCallback)
        .build()
        .unwrap();

    let output = export(&config).await.unwrap();
    assert_eq!(output.stats.kept_posts, 1);
    assert_eq!(output.stats.fetch.requests, 2);
}
