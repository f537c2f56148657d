//! Owned HTML fragments and the tree edits the normalizer is built from.
//!
//! [`Fragment`] wraps a `scraper::Html` parsed in fragment mode. Each edit
//! consumes the fragment and returns the edited one, so a normalization rule
//! is a plain `Fragment → Fragment` function.
//!
//! Attribute edits work on the serialised form instead: scraper does not
//! expose mutable attributes. A start tag is matched as a run of unquoted
//! text and quoted values, so a `>` inside a value (html5ever leaves it
//! unescaped) does not end the tag.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// A parsed HTML fragment.
pub struct Fragment {
    html: Html,
}

impl Fragment {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_fragment(source),
        }
    }

    /// Serialise back to an HTML string.
    pub fn to_html(&self) -> String {
        self.html.root_element().inner_html()
    }

    /// Borrow the underlying document for read-only queries.
    pub fn document(&self) -> &Html {
        &self.html
    }

    /// Detach every element matching `selector`, subtree included.
    pub fn remove(self, selector: &str) -> Self {
        self.remove_where(selector, |_| true)
    }

    /// Detach every element matching `selector` for which `pred` holds.
    pub fn remove_where(mut self, selector: &str, pred: impl Fn(ElementRef<'_>) -> bool) -> Self {
        let Some(sel) = compile(selector) else {
            return self;
        };
        let ids: Vec<_> = self
            .html
            .select(&sel)
            .filter(|el| pred(*el))
            .map(|el| el.id())
            .collect();
        for id in ids {
            if let Some(mut node) = self.html.tree.get_mut(id) {
                node.detach();
            }
        }
        self
    }

    /// Replace each matching element for which `pred` holds with its children.
    pub fn unwrap_where(mut self, selector: &str, pred: impl Fn(ElementRef<'_>) -> bool) -> Self {
        let Some(sel) = compile(selector) else {
            return self;
        };
        let ids: Vec<_> = self
            .html
            .select(&sel)
            .filter(|el| pred(*el))
            .map(|el| el.id())
            .collect();
        for id in ids {
            let children: Vec<_> = match self.html.tree.get(id) {
                Some(node) if node.parent().is_some() => node.children().map(|c| c.id()).collect(),
                _ => continue,
            };
            if let Some(mut node) = self.html.tree.get_mut(id) {
                for child in children {
                    node.insert_id_before(child);
                }
                node.detach();
            }
        }
        self
    }

    /// Attribute `attr` of the first element matching `selector`.
    pub fn first_attr(&self, selector: &str, attr: &str) -> Option<String> {
        let sel = compile(selector)?;
        self.html
            .select(&sel)
            .find_map(|el| el.value().attr(attr))
            .map(str::to_string)
    }

    /// Attribute `attr` of every element matching `selector`, in document order.
    pub fn all_attrs(&self, selector: &str, attr: &str) -> Vec<String> {
        let Some(sel) = compile(selector) else {
            return Vec::new();
        };
        self.html
            .select(&sel)
            .filter_map(|el| el.value().attr(attr))
            .map(str::to_string)
            .collect()
    }
}

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

/// Whether the element has an `<img>` anywhere below it.
pub fn contains_image(el: ElementRef<'_>) -> bool {
    el.select(&IMG).next().is_some()
}

/// Whether the element has an `<img>` below it whose `src` is a local file.
pub fn contains_local_image(el: ElementRef<'_>) -> bool {
    el.select(&IMG)
        .filter_map(|img| img.value().attr("src"))
        .any(|src| src.starts_with("file:"))
}

/// Whether the element has no visible text.
pub fn has_no_text(el: ElementRef<'_>) -> bool {
    el.text().all(|t| t.trim().is_empty())
}

/// Whitespace-collapsed text content of an element.
pub fn clean_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a CSS selector, logging instead of failing on a bad one.
pub fn compile(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("Ignoring invalid selector '{}': {:?}", selector, e);
            None
        }
    }
}

// ── Attribute rewriting on serialised HTML ───────────────────────────────

static RE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#).unwrap()
});

/// Decoded attributes of one start tag, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attrs(Vec<(String, String)>);

impl Attrs {
    fn parse(raw: &str) -> Self {
        Self(
            RE_ATTR
                .captures_iter(raw)
                .map(|c| {
                    let value = c
                        .get(2)
                        .or_else(|| c.get(3))
                        .or_else(|| c.get(4))
                        .map_or("", |m| m.as_str());
                    (
                        c[1].to_ascii_lowercase(),
                        html_escape::decode_html_entities(value).into_owned(),
                    )
                })
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(n, _)| n != name);
    }

    fn render(&self, tag: &str) -> String {
        let mut out = format!("<{tag}");
        for (name, value) in &self.0 {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(value));
            out.push('"');
        }
        out.push('>');
        out
    }
}

/// Rewrite the attributes of every `<tag ...>` start tag in `html`.
///
/// `edit` returns `true` when it changed something; untouched tags are
/// copied through byte for byte.
pub fn rewrite_start_tags(html: &str, tag: &str, mut edit: impl FnMut(&mut Attrs) -> bool) -> String {
    let pattern = format!(
        r#"(?i)<{}(\s(?:[^>"']|"[^"]*"|'[^']*')*)?>"#,
        regex::escape(tag)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return html.to_string();
    };
    re.replace_all(html, |caps: &Captures<'_>| {
        let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let mut attrs = Attrs::parse(raw);
        if edit(&mut attrs) {
            attrs.render(tag)
        } else {
            caps[0].to_string()
        }
    })
    .into_owned()
}
