//! Rendering: turn a finished [`Document`] into bytes.
//!
//! The pipeline only depends on the [`Renderer`] trait. A PDF engine, an
//! EPUB writer or a test double can be injected through
//! [`crate::convert::export_with`]; [`HtmlRenderer`] is the built-in
//! implementation and produces a single self-contained HTML book.
//!
//! ## Inlined images
//!
//! The illustrated variant references cached images as `file://` URLs, and
//! a temporary cache is gone once the export returns. `HtmlRenderer`
//! therefore reads every local image while rendering and embeds it as a
//! base64 data URI. Remote references (images that failed to cache) are
//! kept as links.

use crate::output::{Document, Post};
use crate::pipeline::dom;
use crate::templates;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

/// Error type renderers may return; the caller wraps it with the variant name.
pub type RenderError = Box<dyn std::error::Error + Send + Sync>;

/// Turns a document model into output bytes.
pub trait Renderer: Send + Sync {
    fn render(&self, doc: &Document) -> Result<Vec<u8>, RenderError>;

    /// File extension for written output, without the dot.
    fn extension(&self) -> &str {
        "html"
    }
}

/// Built-in renderer producing a printable single-file HTML book.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    inline_images: bool,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self {
            inline_images: true,
        }
    }
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `file://` references instead of embedding the bytes.
    pub fn inline_images(mut self, yes: bool) -> Self {
        self.inline_images = yes;
        self
    }

    fn image_src(&self, src: &str) -> Option<String> {
        if !self.inline_images || !src.starts_with("file:") {
            return None;
        }
        let path = Url::parse(src).ok()?.to_file_path().ok()?;
        data_uri(&path)
    }

    fn write_post(&self, out: &mut String, index: usize, post: &Post) {
        let _ = writeln!(out, "<section class=\"post\" id=\"post-{index}\">");
        let _ = writeln!(out, "<h1>{}</h1>", text(&post.title));
        out.push_str("<p class=\"post-meta\">");
        if let Some(date) = post.date.as_deref() {
            let _ = write!(out, "{} · ", text(date));
        }
        let _ = writeln!(out, "<a href=\"{0}\">{1}</a></p>", attr(&post.url), text(&post.url));

        let content = if self.inline_images {
            dom::rewrite_start_tags(&post.content, "img", |attrs| {
                let Some(inline) = attrs.get("src").and_then(|s| self.image_src(s)) else {
                    return false;
                };
                attrs.set("src", inline);
                true
            })
        } else {
            post.content.clone()
        };
        let _ = writeln!(out, "<div class=\"post-content\">\n{content}\n</div>");
        out.push_str("</section>\n");
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, doc: &Document) -> Result<Vec<u8>, RenderError> {
        let mut out = templates::document_open(&text(&doc.title));

        out.push_str("<section class=\"title-page\">\n");
        let _ = writeln!(out, "<h1>{}</h1>", text(&doc.title));
        if let Some(author) = doc.author.as_deref() {
            let _ = writeln!(out, "<p class=\"author\">{}</p>", text(author));
        }
        if let Some(front) = doc.front_image.as_deref() {
            let src = self.image_src(front).unwrap_or_else(|| front.to_string());
            let _ = writeln!(out, "<img class=\"front-image\" src=\"{}\" alt=\"\">", attr(&src));
        }
        out.push_str("</section>\n");

        if !doc.posts.is_empty() {
            out.push_str("<nav class=\"toc\">\n");
            let _ = writeln!(out, "<h2>{}</h2>\n<ol>", templates::TOC_HEADING);
            for (i, post) in doc.posts.iter().enumerate() {
                let _ = writeln!(out, "<li><a href=\"#post-{i}\">{}</a></li>", text(&post.title));
            }
            out.push_str("</ol>\n</nav>\n");
        }

        for (i, post) in doc.posts.iter().enumerate() {
            self.write_post(&mut out, i, post);
        }

        out.push_str(templates::DOCUMENT_CLOSE);
        debug!("Rendered '{}' → {} bytes", doc.title, out.len());
        Ok(out.into_bytes())
    }
}

fn data_uri(path: &Path) -> Option<String> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!("Cannot inline {}: {}", path.display(), e);
            return None;
        }
    };
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    };
    Some(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}
