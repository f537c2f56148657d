//! Source adapters: discover and fetch every post of a blog.
//!
//! A [`SourceAdapter`] has one capability, [`posts`](SourceAdapter::posts),
//! which returns a lazy, finite stream of raw [`Post`]s. The stream issues
//! requests only as it is polled and cannot be restarted; calling `posts`
//! again re-crawls from scratch.
//!
//! Two layouts are supported, selected explicitly through [`SourceKind`]:
//!
//! | Kind | Discovery | Pagination ends when |
//! |------|-----------|----------------------|
//! | [`SourceKind::WordPress`] | `<article>` blocks on HTML index pages | no "older posts" link |
//! | [`SourceKind::Substack`]  | `/api/v1/archive` JSON, offset/limit | short or empty page, or an error |
//!
//! Adapters never fail: a post page that cannot be fetched becomes an empty
//! [`Post`] which the assembler later drops. The stream ends early only when
//! a listing request fails or the run is cancelled.

pub mod extract;
pub mod substack;
pub mod wordpress;

pub use substack::SubstackAdapter;
pub use wordpress::WordPressAdapter;

use crate::config::ExportConfig;
use crate::error::Blog2DocError;
use crate::output::Post;
use crate::pipeline::fetch::Fetcher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use tokio_stream::Stream;

/// A boxed stream of raw posts.
pub type PostStream = Pin<Box<dyn Stream<Item = Post> + Send>>;

/// Supported blog layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// HTML index pages with "older posts" pagination.
    WordPress,
    /// Offset-paginated JSON archive API.
    Substack,
}

impl SourceKind {
    /// Build the adapter for this kind.
    pub fn adapter(self, fetcher: Fetcher, config: &ExportConfig) -> Box<dyn SourceAdapter> {
        match self {
            SourceKind::WordPress => Box::new(WordPressAdapter::new(fetcher, config)),
            SourceKind::Substack => Box::new(SubstackAdapter::new(fetcher, config)),
        }
    }

    /// Build the fetcher this kind needs: Substack attaches session cookies
    /// for the publication host when credentials are configured.
    pub fn fetcher(self, config: &ExportConfig) -> Result<Fetcher, Blog2DocError> {
        match (self, config.credentials.cookie_pairs()) {
            (SourceKind::Substack, Some(pairs)) => {
                Fetcher::with_cookies(config, &config.start_url, &pairs)
            }
            _ => Fetcher::new(config),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::WordPress => "wordpress",
            SourceKind::Substack => "substack",
        })
    }
}

impl FromStr for SourceKind {
    type Err = Blog2DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wordpress" | "wp" => Ok(SourceKind::WordPress),
            "substack" => Ok(SourceKind::Substack),
            other => Err(Blog2DocError::UnknownSourceKind(other.to_string())),
        }
    }
}

/// The order in which an adapter yields posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryOrder {
    NewestFirst,
    OldestFirst,
}

/// A crawler for one blog layout.
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Native order of [`posts`](Self::posts); the assembler uses it to
    /// produce oldest-to-newest output.
    fn discovery_order(&self) -> DiscoveryOrder;

    /// Start a fresh crawl.
    fn posts(&self) -> PostStream;
}
