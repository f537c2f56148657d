//! Field extraction from fetched post pages.
//!
//! Title resolution is a fallback chain: an ordered slice of extractor
//! functions tried until one returns a non-empty value. Each adapter owns its
//! chain as a `const` so the chain can be tested on its own.

use crate::pipeline::dom;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use url::Url;

/// One step of a fallback chain.
pub type Extractor = fn(&Html, &Url) -> Option<String>;

/// Run `chain` until an extractor yields a non-empty, trimmed value.
pub fn first_non_empty(chain: &[Extractor], doc: &Html, url: &Url) -> Option<String> {
    chain
        .iter()
        .filter_map(|extract| extract(doc, url))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Collapsed text of the first element matching `selector`.
pub fn select_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = dom::compile(selector)?;
    doc.select(&sel)
        .next()
        .map(dom::clean_text)
        .filter(|t| !t.is_empty())
}

/// Outer HTML of the first element matching `selector`.
pub fn select_html(doc: &Html, selector: &str) -> Option<String> {
    let sel = dom::compile(selector)?;
    doc.select(&sel).next().map(|el| el.html())
}

/// Attribute of the first element matching `selector`.
pub fn select_attr(doc: &Html, selector: &str, attr: &str) -> Option<String> {
    let sel = dom::compile(selector)?;
    doc.select(&sel)
        .find_map(|el| el.value().attr(attr))
        .map(str::to_string)
}

/// `<meta property="og:title">`.
pub fn og_title(doc: &Html, _url: &Url) -> Option<String> {
    select_attr(doc, r#"meta[property="og:title"]"#, "content")
}

static RE_SITE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+[-–—|]\s+.*$").unwrap());

/// `<title>` with a trailing " – Site Name" (or `—`, `|`, ` - `) removed.
pub fn document_title(doc: &Html, _url: &Url) -> Option<String> {
    let title = select_text(doc, "title")?;
    Some(RE_SITE_SUFFIX.replace(&title, "").into_owned())
}

/// Last non-empty path segment, hyphens to spaces, title-cased.
pub fn slug_title(_doc: &Html, url: &Url) -> Option<String> {
    let slug = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let words: Vec<String> = slug
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(title_case)
        .collect();
    Some(words.join(" "))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
