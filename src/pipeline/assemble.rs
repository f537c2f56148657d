//! Document assembly: order posts, derive metadata, build both variants.
//!
//! [`assemble`] is pure. The two variant builders take the assembled
//! document and return a new one: [`text_only`] strips every image and
//! drops the cover, [`illustrate`] routes every image (cover included)
//! through the [`ImageRewriter`].

use crate::output::{Document, Post};
use crate::pipeline::dom::Fragment;
use crate::pipeline::images::ImageRewriter;
use crate::pipeline::normalize;
use crate::source::DiscoveryOrder;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_TITLE: &str = "Blog Posts";
pub const DEFAULT_AUTHOR: &str = "Unknown";

/// Caller-supplied document metadata. `None` means "derive it".
#[derive(Debug, Clone, Default)]
pub struct Overrides<'a> {
    pub title: Option<&'a str>,
    pub author: Option<&'a str>,
    pub cover_image: Option<&'a str>,
}

/// Build the ordered document from everything an adapter emitted.
///
/// Posts without content are dropped. The rest are put oldest-first: a
/// newest-first adapter's output is reversed, an oldest-first one is kept.
pub fn assemble(posts: Vec<Post>, order: DiscoveryOrder, overrides: &Overrides<'_>) -> Document {
    let discovered = posts.len();
    let mut posts: Vec<Post> = posts.into_iter().filter(Post::has_content).collect();
    if order == DiscoveryOrder::NewestFirst {
        posts.reverse();
    }
    info!("Assembling {} of {} discovered posts", posts.len(), discovered);

    let title = overrides
        .title
        .map(str::to_string)
        .or_else(|| posts.first().map(|p| p.title.clone()).filter(|t| !t.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let author = overrides.author.unwrap_or(DEFAULT_AUTHOR).to_string();
    let front_image = overrides
        .cover_image
        .map(str::to_string)
        .or_else(|| first_image(&posts));

    Document {
        title,
        author: Some(author),
        front_image,
        posts,
    }
}

/// The first `<img src>` across posts, in order, resolved against its post URL.
pub fn first_image(posts: &[Post]) -> Option<String> {
    posts.iter().find_map(|post| {
        let src = Fragment::parse(&post.content).first_attr("img", "src")?;
        let src = src.trim();
        if src.is_empty() {
            return None;
        }
        let resolved = Url::parse(&post.url)
            .ok()
            .and_then(|base| base.join(src).ok())
            .map(|u| u.to_string());
        Some(resolved.unwrap_or_else(|| src.to_string()))
    })
}

/// The text-only variant: same posts and metadata, no images, no cover.
pub fn text_only(doc: &Document) -> Document {
    Document {
        title: doc.title.clone(),
        author: doc.author.clone(),
        front_image: None,
        posts: doc
            .posts
            .iter()
            .map(|p| Post {
                content: normalize::strip_images(&p.content),
                ..p.clone()
            })
            .collect(),
    }
}

/// The illustrated variant: every image and the cover localised.
pub async fn illustrate(doc: &Document, rewriter: &mut ImageRewriter<'_>) -> Document {
    let mut posts = Vec::with_capacity(doc.posts.len());
    for post in &doc.posts {
        let content = match Url::parse(&post.url) {
            Ok(base) => rewriter.rewrite_images(&post.content, &base).await,
            Err(_) => {
                debug!("Post URL '{}' is not absolute; images left as-is", post.url);
                post.content.clone()
            }
        };
        posts.push(Post {
            content,
            ..post.clone()
        });
    }

    let front_image = match doc.front_image.as_deref() {
        Some(cover) => Some(rewriter.localize(cover, None).await),
        None => None,
    };

    Document {
        title: doc.title.clone(),
        author: doc.author.clone(),
        front_image,
        posts,
    }
}
