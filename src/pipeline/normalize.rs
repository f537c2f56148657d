//! Content normalization: strip site chrome from a post's HTML.
//!
//! Each source kind has an ordered list of [`Rule`]s, each a CSS selector
//! paired with an [`Action`]. Rules are data so they can be inspected and
//! tested one at a time; [`normalize`] just folds a fragment through them.
//!
//! ## Rule Order
//!
//! Removal rules for known chrome run first, then anchor unwrapping, then the
//! empty-anchor sweep. Unwrapping therefore never lifts content out of a
//! block that a removal rule meant to drop, and the sweep sees anchors only
//! after their images have been moved out.
//!
//! The text-only pass ([`strip_images`]) is a separate transform with its
//! own rule list. It changes what the document *is* (no images at all),
//! not how it looks, and does not depend on the source kind.

use crate::output::Variant;
use crate::pipeline::dom::{self, Fragment};
use crate::source::SourceKind;
use url::Url;

/// What to do with the elements a rule's selector matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Delete the element and its subtree.
    Remove,
    /// Replace an anchor containing an image with its children.
    UnwrapImageLink,
    /// Delete an element with neither visible text nor an image.
    RemoveIfEmpty,
}

/// One `(selector, action)` normalization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub selector: &'static str,
    pub action: Action,
}

impl Rule {
    const fn new(selector: &'static str, action: Action) -> Self {
        Self { selector, action }
    }

    /// Apply this rule to a fragment.
    pub fn apply(&self, fragment: Fragment) -> Fragment {
        match self.action {
            Action::Remove => fragment.remove(self.selector),
            Action::UnwrapImageLink => fragment.unwrap_where(self.selector, dom::contains_image),
            Action::RemoveIfEmpty => fragment.remove_where(self.selector, |el| {
                dom::has_no_text(el) && !dom::contains_image(el)
            }),
        }
    }
}

/// WordPress: sharing buttons, related posts, ad slots.
pub const WORDPRESS_RULES: &[Rule] = &[
    Rule::new(".sharedaddy, .jp-relatedposts, .wpcnt", Action::Remove),
    Rule::new("a", Action::UnwrapImageLink),
];

/// Substack: share/subscribe widgets, embeds, restack buttons, grey-box links.
pub const SUBSTACK_RULES: &[Rule] = &[
    Rule::new(
        ".share-dialog, .subscribe-widget, .button-wrapper, .embedded-post-wrap, \
         .embedded-post, .tweet-embed, .instagram-media, .image-link-expand, .caption-is-link",
        Action::Remove,
    ),
    Rule::new(
        r#"button[aria-label="Link"], button.restack-image, button.view-image"#,
        Action::Remove,
    ),
    Rule::new("a", Action::UnwrapImageLink),
    Rule::new("a", Action::RemoveIfEmpty),
];

/// Text-only variant: every image and every figure/caption container.
pub const TEXT_ONLY_RULES: &[Rule] = &[Rule::new(
    "img, picture, figure, figcaption, .image-caption",
    Action::Remove,
)];

/// The rule list for a source kind.
pub fn rules_for(kind: SourceKind) -> &'static [Rule] {
    match kind {
        SourceKind::WordPress => WORDPRESS_RULES,
        SourceKind::Substack => SUBSTACK_RULES,
    }
}

/// Fold a fragment through `rules` in order.
pub fn apply_rules(html: &str, rules: &[Rule]) -> String {
    rules
        .iter()
        .fold(Fragment::parse(html), |f, rule| rule.apply(f))
        .to_html()
}

/// Normalize a post body for the given source kind and document variant.
///
/// Relative links that survive are resolved against `base_url` so they
/// still work once the post is read offline. The result is stable:
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(html: &str, base_url: &Url, kind: SourceKind, variant: Variant) -> String {
    let cleaned = apply_rules(html, rules_for(kind));
    let cleaned = match variant {
        Variant::Illustrated => cleaned,
        Variant::TextOnly => strip_images(&cleaned),
    };
    let linked = absolutize_links(&cleaned, base_url);
    if linked == cleaned {
        cleaned
    } else {
        // Re-serialise so attribute escaping matches what a second pass produces.
        Fragment::parse(&linked).to_html()
    }
}

/// Remove every image and figure container.
pub fn strip_images(html: &str) -> String {
    apply_rules(html, TEXT_ONLY_RULES)
}

/// Resolve relative `href`s on anchors against `base_url`.
fn absolutize_links(html: &str, base_url: &Url) -> String {
    dom::rewrite_start_tags(html, "a", |attrs| {
        let Some(href) = attrs.get("href") else {
            return false;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || Url::parse(href).is_ok() {
            return false;
        }
        match base_url.join(href) {
            Ok(abs) => {
                attrs.set("href", abs.to_string());
                true
            }
            Err(_) => false,
        }
    })
}
