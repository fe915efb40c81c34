//! Small helpers over `scraper` for markup-tolerant text extraction.

use scraper::{ElementRef, Html, Node, Selector};

const HIDDEN_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Parse a selector, returning `None` instead of failing on bad syntax.
pub fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Trimmed, non-empty text nodes of `el` joined with `sep`.
pub fn element_text(el: ElementRef<'_>, sep: &str) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Text of the whole document minus script, style, and noscript content,
/// one text node per line.
pub fn visible_text(doc: &Html) -> String {
    doc.root_element()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()))
                });
                let t = text.trim();
                (!hidden && !t.is_empty()).then(|| t.to_string())
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of the document's `<title>`, or empty.
pub fn page_title(doc: &Html) -> String {
    selector("title")
        .and_then(|sel| doc.select(&sel).next().map(|el| element_text(el, " ")))
        .unwrap_or_default()
}
