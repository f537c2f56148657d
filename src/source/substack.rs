//! Substack publications: page through the JSON archive API.
//!
//! `GET {base}/api/v1/archive?sort=new&search=&offset=N&limit=L` returns a
//! JSON array of post summaries, newest first. Each summary names the post
//! page, which is then fetched for its full body. Session cookies (when
//! configured on the [`Fetcher`]) unlock paywalled bodies.

use crate::config::ExportConfig;
use crate::error::FetchError;
use crate::output::Post;
use crate::pipeline::fetch::{Fetcher, Posture};
use crate::source::extract::{self, Extractor};
use crate::source::{DiscoveryOrder, PostStream, SourceAdapter, SourceKind};
use futures::stream;
use scraper::Html;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};
use url::Url;

const CONTENT: &str = "div.available-content, div.body, div.markup";
const DATE: &str = "div.post-date, div.pencraft-subtitle";
const NO_TITLE: &str = "No Title";

/// Title chain for a post page.
pub const TITLE_CHAIN: &[Extractor] = &[post_title];

fn post_title(doc: &Html, _url: &Url) -> Option<String> {
    extract::select_text(doc, "h1.post-title, h1.pencraft-title")
}

/// One element of the archive API response. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ArchiveEntry {
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub post_date: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ArchiveEntry {
    /// Post page URL: `canonical_url`, else `{base}/p/{slug}`.
    pub fn post_url(&self, base: &str) -> Option<String> {
        let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        non_empty(&self.canonical_url).or_else(|| non_empty(&self.slug).map(|slug| format!("{base}/p/{slug}")))
    }
}

/// Archive endpoint for one page.
pub fn archive_url(base: &str, offset: usize, limit: usize) -> String {
    format!("{base}/api/v1/archive?sort=new&search=&offset={offset}&limit={limit}")
}

/// Crawls a Substack publication through its archive API.
#[derive(Clone)]
pub struct SubstackAdapter {
    fetcher: Fetcher,
    base: String,
    page_size: usize,
}

impl SubstackAdapter {
    pub fn new(fetcher: Fetcher, config: &ExportConfig) -> Self {
        Self {
            fetcher,
            base: config.base_url().to_string(),
            page_size: config.page_size,
        }
    }
}

impl SourceAdapter for SubstackAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Substack
    }

    fn discovery_order(&self) -> DiscoveryOrder {
        DiscoveryOrder::NewestFirst
    }

    fn posts(&self) -> PostStream {
        let crawl = Crawl {
            fetcher: self.fetcher.clone(),
            base: self.base.clone(),
            page_size: self.page_size,
            offset: 0,
            exhausted: false,
            queue: VecDeque::new(),
            seen: HashSet::new(),
        };
        Box::pin(stream::unfold(crawl, |mut crawl| async move {
            let post = crawl.next_post().await?;
            Some((post, crawl))
        }))
    }
}

struct Pending {
    url: String,
    post_date: Option<String>,
}

struct Crawl {
    fetcher: Fetcher,
    base: String,
    page_size: usize,
    offset: usize,
    exhausted: bool,
    queue: VecDeque<Pending>,
    seen: HashSet<String>,
}

impl Crawl {
    async fn next_post(&mut self) -> Option<Post> {
        loop {
            if let Some(pending) = self.queue.pop_front() {
                return match fetch_post(&self.fetcher, &pending).await {
                    Ok(post) => Some(post),
                    Err(e) if e.is_run_stop() => {
                        info!("Stopping crawl: {}", e);
                        None
                    }
                    Err(e) => {
                        warn!("Error scraping post {}: {}", pending.url, e);
                        Some(Post::empty(pending.url))
                    }
                };
            }

            if self.exhausted {
                return None;
            }
            let entries = self.next_page().await?;
            if entries.len() < self.page_size {
                self.exhausted = true;
            }
            self.offset += self.page_size;

            for entry in entries {
                let Some(url) = entry.post_url(&self.base) else {
                    debug!("Archive entry without URL or slug: {:?}", entry.title);
                    continue;
                };
                if self.seen.insert(url.clone()) {
                    self.queue.push_back(Pending {
                        url,
                        post_date: entry.post_date,
                    });
                }
            }
        }
    }

    /// Fetch and decode one archive page. `None` ends pagination.
    async fn next_page(&mut self) -> Option<Vec<ArchiveEntry>> {
        let url = archive_url(&self.base, self.offset, self.page_size);
        info!("Fetching archive offset {}...", self.offset);

        let body = match self.fetcher.fetch(&url, Posture::Listing).await {
            Ok(r) => r.body,
            Err(e) => {
                warn!("Error fetching {}: {}", url, e);
                return None;
            }
        };

        match serde_json::from_slice::<Vec<ArchiveEntry>>(&body) {
            Ok(entries) if entries.is_empty() => None,
            Ok(entries) => {
                debug!("Archive offset {}: {} entries", self.offset, entries.len());
                Some(entries)
            }
            Err(e) => {
                warn!("Archive response at offset {} is not a post list: {}", self.offset, e);
                None
            }
        }
    }
}

async fn fetch_post(fetcher: &Fetcher, pending: &Pending) -> Result<Post, FetchError> {
    let response = fetcher.fetch(&pending.url, Posture::Item).await?;
    Ok(extract_post(
        &response.text(),
        &pending.url,
        pending.post_date.as_deref(),
    ))
}

/// Build a [`Post`] from a fetched post page.
///
/// The archive's `post_date` stands in when the page shows no date.
pub fn extract_post(html: &str, url: &str, listing_date: Option<&str>) -> Post {
    let doc = Html::parse_document(html);
    let title = Url::parse(url)
        .ok()
        .and_then(|u| extract::first_non_empty(TITLE_CHAIN, &doc, &u))
        .unwrap_or_else(|| NO_TITLE.to_string());
    Post {
        title,
        content: extract::select_html(&doc, CONTENT).unwrap_or_default(),
        date: extract::select_text(&doc, DATE).or_else(|| listing_date.map(str::to_string)),
        url: url.to_string(),
    }
}
