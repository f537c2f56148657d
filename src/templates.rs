//! Page template and stylesheet for the built-in HTML renderer.
//!
//! Kept apart from the renderer so the look of the book can be changed (or
//! inspected in tests) without touching the assembly code.

/// Stylesheet embedded in every rendered book.
///
/// Print rules put the title page, the contents and each post on their own
/// page, so printing the HTML to PDF yields a book layout.
pub const STYLESHEET: &str = r#"
body {
  font-family: Georgia, "Times New Roman", serif;
  line-height: 1.6;
  max-width: 42em;
  margin: 0 auto;
  padding: 2em 1em;
  color: #222;
}
img { max-width: 100%; height: auto; }
figure { margin: 1.5em 0; text-align: center; }
figcaption { font-size: 0.9em; color: #555; }
pre, code { font-family: Menlo, Consolas, monospace; font-size: 0.9em; }
pre { overflow-x: auto; padding: 0.8em; background: #f6f6f6; }
blockquote { margin-left: 0; padding-left: 1em; border-left: 3px solid #ccc; color: #444; }
.title-page { text-align: center; padding-top: 20vh; }
.title-page h1 { font-size: 2.6em; margin-bottom: 0.2em; }
.title-page .author { font-size: 1.3em; color: #555; }
.title-page .front-image { margin-top: 3em; max-height: 50vh; }
.toc ol { padding-left: 1.2em; }
.toc li { margin: 0.2em 0; }
.post-meta { font-size: 0.9em; color: #777; margin-top: -0.5em; }
.post-meta a { color: inherit; }
@media print {
  .title-page, .toc, .post { page-break-after: always; }
  a { color: inherit; text-decoration: none; }
}
"#;

/// Heading of the table of contents.
pub const TOC_HEADING: &str = "Contents";

/// Opening of the document up to and including `<body>`.
///
/// `{title}` must already be HTML-escaped.
pub fn document_open(title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"generator\" content=\"blog2doc {version}\">\n\
         <title>{title}</title>\n<style>{css}</style>\n</head>\n<body>\n",
        version = env!("CARGO_PKG_VERSION"),
        css = STYLESHEET,
    )
}

pub const DOCUMENT_CLOSE: &str = "</body>\n</html>\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_embeds_title_and_style() {
        let head = document_open("My Book");
        assert!(head.starts_with("<!DOCTYPE html>"));
        assert!(head.contains("<title>My Book</title>"));
        assert!(head.contains("page-break-after"));
        assert!(head.ends_with("<body>\n"));
    }
}
