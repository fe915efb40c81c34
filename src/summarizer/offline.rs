//! Deterministic digest used when no model is available or wanted.

use crate::models::Article;
use crate::utils::truncate_chars;

pub const DEFAULT_OFFLINE_LIMIT: usize = 10;
pub const HOT_MARKER: &str = "🔥";
pub const ENGAGEMENT_LINE: &str = "互动话题：你最关注哪条AI新闻？欢迎留言分享你的看法！🤔💬";
const TITLE_MAX: usize = 40;

/// Numbered headline list, highest priority first, ending with the
/// engagement prompt.
pub fn offline_summary(articles: &[Article], limit: usize) -> String {
    let mut sorted: Vec<&Article> = articles.iter().collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut lines = Vec::new();
    for (i, article) in sorted.into_iter().take(limit).enumerate() {
        let title = article.title.replace(['\r', '\n'], "");
        let title = truncate_chars(title.trim(), TITLE_MAX);
        let marker = if article.priority > 0 { HOT_MARKER } else { "" };
        lines.push(format!("{}. {marker}{title}", i + 1));
        lines.push(String::new());
    }
    lines.push(ENGAGEMENT_LINE.to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_summary_empty() {
        assert_eq!(offline_summary(&[], DEFAULT_OFFLINE_LIMIT), ENGAGEMENT_LINE);
    }

    #[test]
    fn test_offline_summary_orders_and_marks() {
        let articles = vec![
            Article::new("Plain story", "https://a.com/1"),
            Article::new("Hot story", "https://a.com/2").with_priority(1),
            Article::new("Another plain", "https://a.com/3"),
        ];

        let text = offline_summary(&articles, DEFAULT_OFFLINE_LIMIT);
        let expected = format!(
            "1. 🔥Hot story\n\n2. Plain story\n\n3. Another plain\n\n{ENGAGEMENT_LINE}"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_offline_summary_truncates_and_strips_newlines() {
        let long = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let articles = vec![Article::new(long, "https://a.com/1")];

        let text = offline_summary(&articles, DEFAULT_OFFLINE_LIMIT);
        let first = text.lines().next().unwrap();
        let title = first.strip_prefix("1. ").unwrap();
        assert_eq!(title.chars().count(), 40);
        assert_eq!(title, format!("{}{}", "a".repeat(30), "b".repeat(10)));
    }

    #[test]
    fn test_offline_summary_respects_limit() {
        let articles: Vec<_> = (0..15)
            .map(|i| Article::new(format!("Story {i}"), format!("https://a.com/{i}")))
            .collect();

        let text = offline_summary(&articles, DEFAULT_OFFLINE_LIMIT);
        assert!(text.contains("10. Story 9"));
        assert!(!text.contains("11."));
        assert!(text.ends_with(ENGAGEMENT_LINE));
    }

    #[test]
    fn test_offline_summary_is_deterministic() {
        let articles = vec![
            Article::new("B", "https://b.com").with_priority(1),
            Article::new("A", "https://a.com"),
        ];
        assert_eq!(
            offline_summary(&articles, 5),
            offline_summary(&articles, 5)
        );
    }
}
