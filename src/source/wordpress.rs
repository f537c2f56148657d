//! WordPress-style blogs: follow "older posts" links across HTML index pages.
//!
//! Each index page lists `<article>` blocks; the title link of each block is
//! the post page. The index excerpt may be truncated ("Continue reading…"),
//! so every post page is fetched for its full body.

use crate::config::ExportConfig;
use crate::error::FetchError;
use crate::output::Post;
use crate::pipeline::dom;
use crate::pipeline::fetch::{Fetcher, Posture};
use crate::source::extract::{self, Extractor};
use crate::source::{DiscoveryOrder, PostStream, SourceAdapter, SourceKind};
use futures::stream;
use scraper::Html;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};
use url::Url;

const ARTICLE: &str = "article";
const ARTICLE_TITLE: &str = ".entry-title";
const OLDER_LINK: &str = ".nav-previous a, .older-posts a";
const CONTENT: &str = ".entry-content";
const DATE: &str = ".entry-date";

/// Title chain for a post page.
pub const TITLE_CHAIN: &[Extractor] = &[
    entry_title,
    extract::og_title,
    extract::document_title,
    extract::slug_title,
];

fn entry_title(doc: &Html, _url: &Url) -> Option<String> {
    extract::select_text(doc, ".entry-title, h1.entry-title, h1.post-title")
}

/// Crawls a WordPress blog from its front page.
#[derive(Clone)]
pub struct WordPressAdapter {
    fetcher: Fetcher,
    start_url: Url,
}

impl WordPressAdapter {
    pub fn new(fetcher: Fetcher, config: &ExportConfig) -> Self {
        Self {
            fetcher,
            start_url: config.start_url.clone(),
        }
    }
}

impl SourceAdapter for WordPressAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::WordPress
    }

    fn discovery_order(&self) -> DiscoveryOrder {
        DiscoveryOrder::NewestFirst
    }

    fn posts(&self) -> PostStream {
        let crawl = Crawl {
            fetcher: self.fetcher.clone(),
            next_page: Some(self.start_url.clone()),
            visited_pages: HashSet::new(),
            queue: VecDeque::new(),
            seen: HashSet::new(),
        };
        Box::pin(stream::unfold(crawl, |mut crawl| async move {
            let post = crawl.next_post().await?;
            Some((post, crawl))
        }))
    }
}

struct Crawl {
    fetcher: Fetcher,
    next_page: Option<Url>,
    visited_pages: HashSet<Url>,
    queue: VecDeque<Url>,
    seen: HashSet<String>,
}

impl Crawl {
    async fn next_post(&mut self) -> Option<Post> {
        loop {
            if let Some(link) = self.queue.pop_front() {
                return match fetch_post(&self.fetcher, &link).await {
                    Ok(post) => Some(post),
                    Err(e) if e.is_run_stop() => {
                        info!("Stopping crawl: {}", e);
                        None
                    }
                    Err(e) => {
                        warn!("Error scraping post {}: {}", link, e);
                        Some(Post::empty(link.as_str()))
                    }
                };
            }

            let page = self.next_page.take()?;
            if !self.visited_pages.insert(page.clone()) {
                warn!("Pagination loops back to {}; stopping", page);
                return None;
            }

            info!("Fetching {}...", page);
            let body = match self.fetcher.fetch(page.as_str(), Posture::Listing).await {
                Ok(r) => r.text(),
                Err(e) => {
                    warn!("Error fetching {}: {}", page, e);
                    return None;
                }
            };

            let listing = parse_listing(&body, &page);
            debug!("{}: {} posts", page, listing.links.len());
            for link in listing.links {
                if self.seen.insert(link.as_str().to_string()) {
                    self.queue.push_back(link);
                }
            }
            self.next_page = listing.older;
        }
    }
}

/// Post links and the "older posts" link of one index page.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Listing {
    pub links: Vec<Url>,
    pub older: Option<Url>,
}

/// Parse an index page.
///
/// Articles without an `.entry-title` are skipped. An article whose title is
/// not a link falls back to the index page URL itself.
pub fn parse_listing(html: &str, page_url: &Url) -> Listing {
    let doc = Html::parse_document(html);
    let (Some(article_sel), Some(title_sel), Some(link_sel)) = (
        dom::compile(ARTICLE),
        dom::compile(ARTICLE_TITLE),
        dom::compile("a[href]"),
    ) else {
        return Listing::default();
    };

    let links = doc
        .select(&article_sel)
        .filter_map(|article| article.select(&title_sel).next())
        .map(|title| {
            title
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| page_url.join(href).ok())
                .unwrap_or_else(|| page_url.clone())
        })
        .collect();

    let older = extract::select_attr(&doc, OLDER_LINK, "href").and_then(|href| page_url.join(&href).ok());

    Listing { links, older }
}

async fn fetch_post(fetcher: &Fetcher, url: &Url) -> Result<Post, FetchError> {
    let response = fetcher.fetch(url.as_str(), Posture::Item).await?;
    Ok(extract_post(&response.text(), url))
}

/// Build a [`Post`] from a fetched post page.
pub fn extract_post(html: &str, url: &Url) -> Post {
    let doc = Html::parse_document(html);
    Post {
        title: extract::first_non_empty(TITLE_CHAIN, &doc, url).unwrap_or_default(),
        content: extract::select_html(&doc, CONTENT).unwrap_or_default(),
        date: extract::select_text(&doc, DATE),
        url: url.to_string(),
    }
}
