//! Field-length truncation applied before articles are sent to a model.

use crate::models::{Article, CompressedArticle};
use crate::utils::truncate_chars;

/// Trim titles and descriptions to character budgets and drop `content` and
/// `source`. Truncation is plain: no ellipsis is added.
pub fn compress(articles: &[Article], title_max: usize, desc_max: usize) -> Vec<CompressedArticle> {
    articles
        .iter()
        .map(|a| CompressedArticle {
            title: truncate_chars(&a.title, title_max),
            link: a.link.clone(),
            publish_time: a.publish_time.clone(),
            description: truncate_chars(&a.description, desc_max),
            priority: a.priority,
        })
        .collect()
}
