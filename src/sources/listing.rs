//! Headline listing scrapers for TechCrunch and The Verge.
//!
//! Both sites expose a page of headline links whose URLs carry the publish
//! date (`/2025/11/08/slug`). The scraper collects anchors from a list of
//! selectors, keeps on-domain links with real titles, dates them from the URL,
//! and returns those published today or yesterday in UTC+8.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::Html;
use std::collections::HashSet;
use tracing::{debug, info, instrument};
use url::Url;

use super::html::{element_text, selector};
use super::http::{PAGE_TIMEOUT, browser_client, get_text};
use super::{Source, SourceError};
use crate::models::Article;
use crate::utils::{beijing_today, truncate_chars};

const MIN_TITLE_CHARS: usize = 10;
const MAX_TITLE_CHARS: usize = 150;

const TECHCRUNCH_SELECTORS: &[&str] = &[
    "h2 a",
    "h3 a",
    "h1 a",
    "article h2 a",
    "article h3 a",
    ".post-block a",
    ".river-block a",
];
const THEVERGE_SELECTORS: &[&str] = &["h2 a", "h3 a", ".duet--content-cards--content-card a"];

static URL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})/").expect("valid url date regex"));
static YEAR_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d{4}/").expect("valid year regex"));

#[derive(Debug)]
pub struct ListingSource {
    name: &'static str,
    client: Client,
    index_url: String,
    base: Url,
    domain: String,
    selectors: &'static [&'static str],
    require_dated_path: bool,
}

impl ListingSource {
    /// A listing scraper for `index_url`. Relative links resolve against it
    /// and only hosts equal to, or under, `domain` are kept.
    pub fn new(
        name: &'static str,
        index_url: &str,
        domain: &str,
        selectors: &'static [&'static str],
        require_dated_path: bool,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            name,
            client: browser_client(PAGE_TIMEOUT)?,
            index_url: index_url.to_string(),
            base: Url::parse(index_url)?,
            domain: domain.to_string(),
            selectors,
            require_dated_path,
        })
    }

    pub fn techcrunch() -> Result<Self, SourceError> {
        Self::new(
            "techcrunch",
            "https://techcrunch.com",
            "techcrunch.com",
            TECHCRUNCH_SELECTORS,
            true,
        )
    }

    pub fn theverge() -> Result<Self, SourceError> {
        Self::new(
            "theverge",
            "https://www.theverge.com/ai-artificial-intelligence",
            "theverge.com",
            THEVERGE_SELECTORS,
            false,
        )
    }

    fn on_domain(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|host| {
            host == self.domain || host.ends_with(&format!(".{}", self.domain))
        })
    }

    /// Every acceptable headline on the page, in selector order, deduplicated
    /// by URL. `publish_time` is the URL date or empty.
    pub fn parse_listing(&self, html: &str, today: NaiveDate) -> Vec<Article> {
        let doc = Html::parse_document(html);

        let year_selectors: Vec<String> = [today.year(), today.year() - 1]
            .iter()
            .map(|year| format!(r#"a[href*="/{year}/"]"#))
            .collect();
        let all_selectors = self
            .selectors
            .iter()
            .copied()
            .chain(year_selectors.iter().map(String::as_str));

        let mut seen = HashSet::new();
        let mut articles = Vec::new();
        for css in all_selectors {
            let Some(sel) = selector(css) else { continue };
            for a in doc.select(&sel) {
                if a.value().name() != "a" {
                    continue;
                }
                let Some(href) = a.value().attr("href").map(str::trim) else { continue };
                if href.is_empty() {
                    continue;
                }
                let Ok(url) = self.base.join(href) else { continue };
                let link = url.to_string();

                let title = element_text(a, " ");
                if seen.contains(&link)
                    || title.chars().count() < MIN_TITLE_CHARS
                    || !self.on_domain(&url)
                    || (self.require_dated_path && !YEAR_SEGMENT.is_match(url.path()))
                {
                    continue;
                }
                seen.insert(link.clone());

                let publish_time = date_from_url(&link)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                articles.push(Article {
                    title: truncate_chars(&title, MAX_TITLE_CHARS),
                    link,
                    publish_time,
                    source: self.name.to_string(),
                    ..Article::default()
                });
            }
        }
        debug!(source = self.name, candidates = articles.len(), "Parsed listing");
        articles
    }

    async fn fetch_for(&self, today: NaiveDate, max_articles: usize) -> Result<Vec<Article>, SourceError> {
        let html = get_text(&self.client, &self.index_url).await?;
        let candidates = self.parse_listing(&html, today);
        let total = candidates.len();

        let recent: Vec<Article> = candidates
            .into_iter()
            .filter(|a| is_recent(&a.publish_time, today))
            .map(|a| a.with_priority(1))
            .take(max_articles)
            .collect();
        info!(source = self.name, total, recent = recent.len(), "Filtered listing to recent headlines");
        Ok(recent)
    }
}

#[async_trait]
impl Source for ListingSource {
    fn name(&self) -> &str {
        self.name
    }

    #[instrument(level = "info", skip_all, fields(source = self.name))]
    async fn fetch(&self, max_articles: usize) -> Result<Vec<Article>, SourceError> {
        self.fetch_for(beijing_today(), max_articles).await
    }
}

/// Calendar date embedded in a `/YYYY/M/D/` path segment.
pub fn date_from_url(url: &str) -> Option<NaiveDate> {
    let caps = URL_DATE.captures(url)?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

/// Published today or yesterday. Unknown or unparsable dates are not recent.
pub fn is_recent(publish_time: &str, today: NaiveDate) -> bool {
    NaiveDate::parse_from_str(publish_time, "%Y-%m-%d")
        .is_ok_and(|date| (today - date).num_days() <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const TECHCRUNCH_PAGE: &str = r#"
        <html><body>
          <h2><a href="/2025/11/08/openai-ships-a-new-model/">OpenAI ships a new model</a></h2>
          <h3><a href="https://techcrunch.com/2025/11/07/anthropic-raises-again/">Anthropic raises again today</a></h3>
          <h3><a href="/2025/11/01/old-news-story/">An older story from last week</a></h3>
          <h2><a href="/category/ai/">Artificial intelligence coverage</a></h2>
          <h2><a href="https://elsewhere.com/2025/11/08/x/">Off-domain story with long title</a></h2>
          <h2><a href="/2025/11/08/short/">Short</a></h2>
          <div class="post-block"><a href="/2025/11/08/openai-ships-a-new-model/">OpenAI ships a new model</a></div>
          <p><a href="/2024/12/31/year-end-roundup/">The year-end roundup of AI</a></p>
        </body></html>
    "#;

    #[test]
    fn test_date_from_url() {
        assert_eq!(date_from_url("https://x.com/2025/11/08/slug/"), Some(day(2025, 11, 8)));
        assert_eq!(date_from_url("https://x.com/2025/1/8/slug"), Some(day(2025, 1, 8)));
        assert_eq!(date_from_url("https://x.com/2025/13/08/slug"), None);
        assert_eq!(date_from_url("https://x.com/news/123"), None);
    }

    #[test]
    fn test_is_recent() {
        let today = day(2025, 11, 8);
        assert!(is_recent("2025-11-08", today));
        assert!(is_recent("2025-11-07", today));
        assert!(!is_recent("2025-11-06", today));
        assert!(!is_recent("", today));
        assert!(!is_recent("soon", today));
    }

    #[test]
    fn test_parse_techcrunch_listing() {
        let source = ListingSource::techcrunch().unwrap();
        let articles = source.parse_listing(TECHCRUNCH_PAGE, day(2025, 11, 8));
        let links: Vec<_> = articles.iter().map(|a| a.link.as_str()).collect();

        assert_eq!(
            links,
            vec![
                "https://techcrunch.com/2025/11/08/openai-ships-a-new-model/",
                "https://techcrunch.com/2025/11/07/anthropic-raises-again/",
                "https://techcrunch.com/2025/11/01/old-news-story/",
                "https://techcrunch.com/2024/12/31/year-end-roundup/",
            ]
        );
        assert_eq!(articles[0].title, "OpenAI ships a new model");
        assert_eq!(articles[0].publish_time, "2025-11-08");
        assert_eq!(articles[0].source, "techcrunch");
    }

    #[test]
    fn test_verge_accepts_undated_subdomain_links() {
        let source = ListingSource::theverge().unwrap();
        let html = r#"
            <h2><a href="/ai-artificial-intelligence/812345/model-launch">A model launch story</a></h2>
            <h2><a href="https://www.theverge.com/2025/11/8/123/agents">Agents are everywhere now</a></h2>
        "#;
        let articles = source.parse_listing(html, day(2025, 11, 8));

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].publish_time, "");
        assert_eq!(articles[1].publish_time, "2025-11-08");
    }

    #[test]
    fn test_titles_are_capped() {
        let source = ListingSource::theverge().unwrap();
        let long = "长".repeat(200);
        let html = format!(r#"<h2><a href="/2025/11/08/x/">{long}</a></h2>"#);
        let articles = source.parse_listing(&html, day(2025, 11, 8));
        assert_eq!(articles[0].title.chars().count(), MAX_TITLE_CHARS);
    }

    #[tokio::test]
    async fn test_fetch_keeps_recent_up_to_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TECHCRUNCH_PAGE.replace(
                "https://techcrunch.com",
                "",
            )))
            .mount(&server)
            .await;

        let source =
            ListingSource::new("techcrunch", &format!("{}/", server.uri()), "127.0.0.1", TECHCRUNCH_SELECTORS, true)
                .unwrap();

        let articles = source.fetch_for(day(2025, 11, 8), 10).await.unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["OpenAI ships a new model", "Anthropic raises again today"]);
        assert!(articles.iter().all(|a| a.priority == 1));

        let capped = source.fetch_for(day(2025, 11, 8), 1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }
}
