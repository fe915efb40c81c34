//! Per-run deduplication of articles collected from all sources.
//!
//! Two records describe the same story when their normalized titles and link
//! domains match. When several sources report a story, the highest-priority
//! record wins; ties go to the record that was aggregated first.

use crate::models::Article;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

// Whitespace, ASCII dash, underscore, and the common Unicode dashes.
static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-_\u{2010}-\u{2015}\u{2212}]+").expect("valid separator regex"));

/// Lower-case, trim, and collapse separator runs into single spaces.
///
/// Separator runs at either end are dropped as well, so a trailing dash does
/// not make a new story.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_title("  Foo__Bar "), "foo bar");
/// assert_eq!(normalize_title("Foo -"), "foo");
/// ```
pub fn normalize_title(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    SEPARATORS.replace_all(&lowered, " ").trim().to_string()
}

/// URL authority of `link`, or an empty string when it does not parse.
///
/// The host comes back as `url` normalizes it: lower-cased, without
/// credentials, and without a port that is the scheme default.
pub fn link_domain(link: &str) -> String {
    match Url::parse(link.trim()) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default();
            match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            }
        }
        Err(_) => String::new(),
    }
}

/// Fingerprint of an article: hash of `normalized title | domain`.
pub fn article_key(article: &Article) -> String {
    let base = format!(
        "{}|{}",
        normalize_title(&article.title),
        link_domain(&article.link)
    );
    format!("{:x}", Sha256::digest(base.as_bytes()))
}

/// Collapse duplicate stories, keeping the highest-priority instance.
///
/// The output is ordered by priority descending; among equal priorities the
/// original aggregation order is preserved.
///
/// # Arguments
///
/// * `articles` - Records from every source, in aggregation order
///
/// # Returns
///
/// One record per [`article_key`], never more than were passed in.
pub fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    let mut sorted = articles;
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut seen = HashSet::new();
    let mut kept: Vec<Article> = sorted
        .into_iter()
        .filter(|article| seen.insert(article_key(article)))
        .collect();

    kept.sort_by(|a, b| b.priority.cmp(&a.priority));
    kept
}
