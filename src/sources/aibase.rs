//! AIBase daily digest scraper.
//!
//! [AIBase](https://news.aibase.com/zh/daily) publishes one AI news digest per
//! day. The index page links to many detail pages; the newest digest is picked
//! by scoring the links, then its detail page is parsed.
//!
//! The digest is accepted only when it can be shown to be from today in UTC+8,
//! either from a `2025年11月8号` style date in the body or from the page's
//! publish time. Otherwise the source yields nothing for this run.

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html};
use tracing::{debug, info, instrument};
use url::Url;

use super::html::{element_text, page_title, selector, visible_text};
use super::http::{PAGE_TIMEOUT, browser_client, get_text};
use super::{Source, SourceError};
use crate::models::Article;
use crate::utils::{beijing_today, truncate_chars};

pub const NAME: &str = "aibase";
const BASE_URL: &str = "https://news.aibase.com";
const DAILY_URL: &str = "https://news.aibase.com/zh/daily";

const DETAIL_PATHS: [&str; 4] = ["/daily/", "/article/", "/news/", "/post/"];
const TITLE_SELECTORS: [&str; 6] = [
    "h1",
    "h1.entry-title",
    ".post-title",
    ".article-title",
    ".title",
    "header h1",
];
const TIME_SELECTORS: [&str; 7] = [
    "time[datetime]",
    "time",
    "meta[property='article:published_time']",
    "meta[name='pubdate']",
    ".post-meta time",
    ".article-meta time",
    ".date",
];
const SUMMARY_AREAS: [&str; 7] = [
    "article",
    ".post-content",
    ".article-content",
    ".content",
    "#content",
    ".entry-content",
    "main",
];
const BODY_AREA: &str = "article, .post-content, .article-content, .content, \
#content, .entry-content, main, #main, [role='main']";
const SUMMARY_MAX_CHARS: usize = 400;
const PUBLISH_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y年%m月%d日"];

static URL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}[-/]\d{2}[-/]\d{2}").expect("valid url date regex"));
static CONTENT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})年(\d{1,2})月(\d{1,2})号").expect("valid content date regex"));
static TZ_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\+\d{2}:\d{2}|\s*Z|\s*UTC.*").expect("valid tz suffix regex"));
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

#[derive(Debug)]
pub struct AiBaseSource {
    client: Client,
    base_url: Url,
    daily_url: String,
}

impl AiBaseSource {
    pub fn new() -> Result<Self, SourceError> {
        Self::with_urls(BASE_URL, DAILY_URL)
    }

    /// Point the scraper at another host (used by tests).
    pub fn with_urls(base_url: &str, daily_url: &str) -> Result<Self, SourceError> {
        Ok(Self {
            client: browser_client(PAGE_TIMEOUT)?,
            base_url: Url::parse(base_url)?,
            daily_url: daily_url.to_string(),
        })
    }

    async fn fetch_for(&self, today: NaiveDate) -> Result<Vec<Article>, SourceError> {
        let index = get_text(&self.client, &self.daily_url).await?;
        let Some(link) = find_latest_link(&index, &self.base_url) else {
            info!("No digest link found on index page");
            return Ok(Vec::new());
        };
        debug!(%link, "Selected digest link");

        let detail = get_text(&self.client, &link).await?;
        let mut article = extract_detail(&detail, &link);

        if !is_today(&article, today) {
            info!(%link, publish_time = %article.publish_time, "Latest digest is not from today");
            return Ok(Vec::new());
        }

        if let Some(date) = parse_publish_date(&article.publish_time) {
            article.publish_time = date.format("%Y-%m-%d").to_string();
        } else if article.publish_time.is_empty() {
            article.publish_time = today.format("%Y-%m-%d").to_string();
        }
        Ok(vec![article.with_priority(1).with_source(NAME)])
    }
}

#[async_trait]
impl Source for AiBaseSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(level = "info", skip_all, fields(source = NAME))]
    async fn fetch(&self, _max_articles: usize) -> Result<Vec<Article>, SourceError> {
        self.fetch_for(beijing_today()).await
    }
}

/// Score a candidate detail link; higher is more likely today's digest.
pub fn score_link(url: &str, text: &str) -> f64 {
    let mut score = 0.0;
    if URL_DATE.is_match(url) {
        score += 10.0;
    }
    if url.contains("/daily/") {
        score += 5.0;
    }
    if (10..=100).contains(&text.chars().count()) {
        score += 3.0;
    }
    score + url.len() as f64 / 1000.0
}

/// Best-scoring detail link on the index page. Earlier links win ties.
pub fn find_latest_link(html: &str, base: &Url) -> Option<String> {
    let doc = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    let mut best: Option<(f64, String)> = None;
    for a in doc.select(&anchors) {
        let href = a.value().attr("href").unwrap_or_default().trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(full) = base.join(href) else { continue };
        let full = full.to_string();
        if !DETAIL_PATHS.iter().any(|p| full.contains(p)) {
            continue;
        }
        let score = score_link(&full, &element_text(a, " "));
        if best.as_ref().is_none_or(|(top, _)| score > *top) {
            best = Some((score, full));
        }
    }
    best.map(|(_, url)| url)
}

/// Parse a detail page into an article with raw `publish_time`.
pub fn extract_detail(html: &str, link: &str) -> Article {
    let doc = Html::parse_document(html);
    Article {
        title: pick_text(&doc, &TITLE_SELECTORS),
        link: link.to_string(),
        description: extract_summary(&doc, SUMMARY_MAX_CHARS),
        publish_time: extract_time(&doc),
        content: extract_full_text(&doc),
        priority: 0,
        source: NAME.to_string(),
    }
}

/// First selector match with more than 4 characters of text, else `<title>`.
fn pick_text(doc: &Html, selectors: &[&str]) -> String {
    for css in selectors {
        let Some(sel) = selector(css) else { continue };
        for el in doc.select(&sel) {
            let text = element_text(el, " ");
            if text.chars().count() > 4 {
                return text;
            }
        }
    }
    page_title(doc)
}

fn extract_time(doc: &Html) -> String {
    for css in TIME_SELECTORS {
        let Some(sel) = selector(css) else { continue };
        let Some(el) = doc.select(&sel).next() else { continue };
        let value = match el.value().name() {
            "time" => el
                .value()
                .attr("datetime")
                .map(str::to_string)
                .unwrap_or_else(|| element_text(el, " ")),
            "meta" => el.value().attr("content").unwrap_or_default().to_string(),
            _ => element_text(el, " "),
        };
        let value = value.trim();
        if !value.is_empty() {
            return value.to_string();
        }
    }
    String::new()
}

/// Leading paragraphs of the main content area, capped at `max_chars`.
fn extract_summary(doc: &Html, max_chars: usize) -> String {
    let mut areas: Vec<ElementRef<'_>> = SUMMARY_AREAS
        .iter()
        .filter_map(|css| selector(css).and_then(|sel| doc.select(&sel).next()))
        .collect();
    if areas.is_empty() {
        areas.push(doc.root_element());
    }
    let Some(blocks) = selector("p, li") else {
        return String::new();
    };

    let mut texts: Vec<String> = Vec::new();
    for area in areas {
        let mut total = 0;
        for block in area.select(&blocks).take(20) {
            let text = element_text(block, " ");
            let len = text.chars().count();
            if len > 20 {
                total += len;
                texts.push(text);
            }
            if total >= max_chars {
                break;
            }
        }
        if !texts.is_empty() {
            break;
        }
    }

    let summary = texts.join(" ");
    if summary.chars().count() > max_chars {
        format!("{}…", truncate_chars(&summary, max_chars - 1))
    } else {
        summary
    }
}

fn extract_full_text(doc: &Html) -> String {
    let text = selector(BODY_AREA)
        .and_then(|sel| doc.select(&sel).next())
        .map(|area| element_text(area, "\n"))
        .unwrap_or_else(|| visible_text(doc));
    BLANK_RUNS.replace_all(&text, "\n\n").into_owned()
}

/// First `YYYY年M月D号` date in `content`.
pub fn content_date(content: &str) -> Option<NaiveDate> {
    let caps = CONTENT_DATE.captures(content)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Date part of a publish time such as `2025-11-08T09:30:00+08:00`,
/// `2025/11/08` or `2025年11月8日`.
pub fn parse_publish_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = TZ_SUFFIX.replace_all(raw.trim(), "");
    PUBLISH_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_and_remainder(&cleaned, fmt).ok())
        .map(|(date, _)| date)
}

/// Whether the article carries evidence of being published on `today`.
pub fn is_today(article: &Article, today: NaiveDate) -> bool {
    content_date(&article.content) == Some(today)
        || parse_publish_date(&article.publish_time) == Some(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INDEX: &str = r##"
        <html><body>
          <a href="#top">Top</a>
          <a href="/zh/about">About us</a>
          <a href="/zh/news/123">Some news item about models</a>
          <a href="/zh/daily/22001">AI日报：今日要闻一览</a>
          <a href="/zh/daily/2025-11-07">昨日</a>
          <a href="https://other.example/post/9">External post</a>
        </body></html>
    "##;

    fn detail_page(body_date: &str, time: &str) -> String {
        format!(
            r#"<html><head><title>AIBase 日报</title></head><body>
              <header><h1>AI日报：OpenAI 发布新模型</h1></header>
              <div class="post-meta"><time datetime="{time}">ignored</time></div>
              <article>
                <p>欢迎来到【AI日报】栏目！这里是你每天探索人工智能世界的指南。{body_date}</p>
                <p>short</p>
                <li>1、OpenAI 发布了新的推理模型，性能显著提升，引发广泛关注。</li>
              </article>
              <script>var tracking = true;</script>
            </body></html>"#
        )
    }

    fn base() -> Url {
        Url::parse(BASE_URL).unwrap()
    }

    #[test]
    fn test_score_link() {
        assert!(score_link("https://x.com/daily/2025-11-08", "短") > 15.0);
        assert!(score_link("https://x.com/news/1", "a title of decent length") > 3.0);
        assert!(score_link("https://x.com/news/1", "tiny") < 1.0);
    }

    #[test]
    fn test_find_latest_link_prefers_dated_daily() {
        let link = find_latest_link(INDEX, &base()).unwrap();
        assert_eq!(link, "https://news.aibase.com/zh/daily/2025-11-07");
    }

    #[test]
    fn test_find_latest_link_none_without_candidates() {
        let html = r#"<a href="/about">About</a><a href="">x</a>"#;
        assert_eq!(find_latest_link(html, &base()), None);
    }

    #[test]
    fn test_find_latest_link_tie_keeps_first() {
        let html = r#"<a href="/daily/1">First digest headline</a><a href="/daily/2">Other digest headline</a>"#;
        assert_eq!(
            find_latest_link(html, &base()).unwrap(),
            "https://news.aibase.com/daily/1"
        );
    }

    #[test]
    fn test_extract_detail() {
        let html = detail_page("2025年11月8号", "2025-11-08T09:00:00+08:00");
        let article = extract_detail(&html, "https://news.aibase.com/zh/daily/22001");

        assert_eq!(article.title, "AI日报：OpenAI 发布新模型");
        assert_eq!(article.publish_time, "2025-11-08T09:00:00+08:00");
        assert!(article.description.starts_with("欢迎来到【AI日报】栏目"));
        assert!(article.description.contains("OpenAI 发布了新的推理模型"));
        assert!(!article.description.contains("short"));
        assert!(article.content.contains("2025年11月8号"));
        assert!(!article.content.contains("tracking"));
    }

    #[test]
    fn test_title_falls_back_to_page_title() {
        let html = "<html><head><title>Fallback title</title></head><body><h1>Hi</h1></body></html>";
        let article = extract_detail(html, "https://x.com/daily/1");
        assert_eq!(article.title, "Fallback title");
    }

    #[test]
    fn test_summary_is_capped() {
        let para = "很长的段落".repeat(100);
        let html = format!("<article><p>{para}</p><p>{para}</p></article>");
        let article = extract_detail(&html, "https://x.com/daily/1");
        assert_eq!(article.description.chars().count(), SUMMARY_MAX_CHARS);
        assert!(article.description.ends_with('…'));
    }

    #[test]
    fn test_parse_publish_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 11, 8);
        assert_eq!(parse_publish_date("2025-11-08T09:00:00+08:00"), expected);
        assert_eq!(parse_publish_date("2025-11-08T01:00:00Z"), expected);
        assert_eq!(parse_publish_date("2025/11/08 10:00 UTC+8"), expected);
        assert_eq!(parse_publish_date("2025年11月8日"), expected);
        assert_eq!(parse_publish_date("yesterday"), None);
        assert_eq!(parse_publish_date(""), None);
    }

    #[test]
    fn test_content_date() {
        assert_eq!(
            content_date("今天是2025年11月8号，星期六"),
            NaiveDate::from_ymd_opt(2025, 11, 8)
        );
        assert_eq!(content_date("2025年13月40号"), None);
        assert_eq!(content_date("no date"), None);
    }

    #[test]
    fn test_is_today() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 8).unwrap();

        let mut article = Article::new("t", "l");
        article.content = "2025年11月8号".to_string();
        assert!(is_today(&article, today));

        article.content = "2025年11月7号".to_string();
        article.publish_time = "2025-11-08".to_string();
        assert!(is_today(&article, today));

        article.publish_time = "2025-11-07".to_string();
        assert!(!is_today(&article, today));
    }

    async fn serve(body_date: &str, time: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zh/daily"))
            .respond_with(ResponseTemplate::new(200).set_body_string(INDEX))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/zh/daily/2025-11-07"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(body_date, time)))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_fetch_accepts_todays_digest() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 8).unwrap();
        let marker = format!("{}年{}月{}号", today.year(), today.month(), today.day());
        let server = serve(&marker, "").await;

        let source =
            AiBaseSource::with_urls(&server.uri(), &format!("{}/zh/daily", server.uri())).unwrap();
        let articles = source.fetch_for(today).await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].priority, 1);
        assert_eq!(articles[0].source, NAME);
        assert_eq!(articles[0].publish_time, "2025-11-08");
        assert!(articles[0].link.ends_with("/zh/daily/2025-11-07"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_stale_digest() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 8).unwrap();
        let server = serve("2025年11月7号", "2025-11-07T08:00:00+08:00").await;

        let source =
            AiBaseSource::with_urls(&server.uri(), &format!("{}/zh/daily", server.uri())).unwrap();
        assert!(source.fetch_for(today).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_propagates_index_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source =
            AiBaseSource::with_urls(&server.uri(), &format!("{}/zh/daily", server.uri())).unwrap();
        let err = source
            .fetch_for(NaiveDate::from_ymd_opt(2025, 11, 8).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 500, .. }));
    }
}
