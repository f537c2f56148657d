//! Data produced by the pipeline: posts, documents and run statistics.

use crate::pipeline::fetch::FetchStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One blog post as produced by a source adapter.
///
/// `content` is an HTML fragment. An adapter that failed to fetch a post
/// still emits it with empty `content`; the assembler drops such records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub content: String,
    pub date: Option<String>,
    pub url: String,
}

impl Post {
    /// A placeholder for a post whose page could not be retrieved.
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Which of the two renderable forms a document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// Images cached locally and embedded.
    Illustrated,
    /// Every image and figure stripped.
    TextOnly,
}

impl Variant {
    /// Suffix used in output file names.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Variant::Illustrated => "with_images",
            Variant::TextOnly => "without_images",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Variant::Illustrated => "illustrated",
            Variant::TextOnly => "text-only",
        })
    }
}

/// An ordered, renderable document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub author: Option<String>,
    /// Cover reference: a remote URL, a local path, or a `file://` URL.
    pub front_image: Option<String>,
    /// Oldest first.
    pub posts: Vec<Post>,
}

/// Per-run statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportStats {
    /// Records emitted by the adapter, including empty ones.
    pub discovered_posts: usize,
    /// Posts that made it into the documents.
    pub kept_posts: usize,
    /// Distinct images now present in the cache.
    pub cached_images: usize,
    /// `<img>` elements left pointing at their remote URL.
    pub failed_images: usize,
    pub fetch: FetchStats,
    pub total_duration_ms: u64,
}

/// Result of an in-memory export: both rendered variants.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub illustrated: Vec<u8>,
    pub text_only: Vec<u8>,
    /// The illustrated document model (image references local).
    pub document: Document,
    pub stats: ExportStats,
}

/// Paths written by [`crate::convert::export_to_dir`].
#[derive(Debug, Clone)]
pub struct WrittenFiles {
    pub illustrated: PathBuf,
    pub text_only: PathBuf,
    pub stats: ExportStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_post_has_no_content() {
        let p = Post::empty("https://a.example/p/x");
        assert!(!p.has_content());
        assert_eq!(p.url, "https://a.example/p/x");
    }

    #[test]
    fn whitespace_is_not_content() {
        let p = Post {
            content: "  \n ".into(),
            ..Post::default()
        };
        assert!(!p.has_content());
    }

    #[test]
    fn variant_suffixes() {
        assert_eq!(Variant::Illustrated.file_suffix(), "with_images");
        assert_eq!(Variant::TextOnly.file_suffix(), "without_images");
    }
}
