//! Syft newsletter feed.
//!
//! A small web app exposes the day's curated newsletter items as JSON:
//!
//! ```json
//! { "success": true, "articles": [ { "title": "...", "link": "...", "description": "...", "date": "2025-11-08" } ] }
//! ```
//!
//! The source is inert until both the endpoint URL and its shared secret are
//! configured.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::http::{FEED_TIMEOUT, browser_client};
use super::{Source, SourceError};
use crate::models::Article;
use crate::utils::{beijing_today, truncate_for_log};

pub const NAME: &str = "syft";

#[derive(Debug)]
pub struct SyftSource {
    client: Client,
    web_app_url: String,
    secret_key: String,
}

impl SyftSource {
    pub fn new(web_app_url: &str, secret_key: &str) -> Result<Self, SourceError> {
        Ok(Self {
            client: browser_client(FEED_TIMEOUT)?,
            web_app_url: web_app_url.trim().to_string(),
            secret_key: secret_key.trim().to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.web_app_url.is_empty() && !self.secret_key.is_empty()
    }

    async fn fetch_for(&self, today: NaiveDate, max_articles: usize) -> Result<Vec<Article>, SourceError> {
        if !self.is_configured() {
            info!("Syft endpoint or secret not configured; skipping");
            return Ok(Vec::new());
        }

        let date = today.format("%Y-%m-%d").to_string();
        let resp = self
            .client
            .get(&self.web_app_url)
            .query(&[("secret", self.secret_key.as_str()), ("date", date.as_str())])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: self.web_app_url.clone(),
                status: status.as_u16(),
            });
        }
        let text = resp.text().await?;
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            SourceError::Parse(format!("feed is not JSON ({e}): {}", truncate_for_log(&text, 120)))
        })?;
        Ok(parse_feed(&body, &date, max_articles))
    }
}

#[async_trait]
impl Source for SyftSource {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(level = "info", skip_all, fields(source = NAME))]
    async fn fetch(&self, max_articles: usize) -> Result<Vec<Article>, SourceError> {
        self.fetch_for(beijing_today(), max_articles).await
    }
}

fn str_field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or_default().trim()
}

/// Whether a JSON flag reads as set: `true`, a non-zero number, or a
/// non-empty string, array, or object.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Map a feed response into articles.
///
/// A missing or falsy `success` flag means nothing for today. Items with
/// neither a title nor a link are dropped; `date` defaults to `today`.
pub fn parse_feed(body: &Value, today: &str, max_articles: usize) -> Vec<Article> {
    if !is_truthy(body.get("success")) {
        warn!("Syft feed reported no success");
        return Vec::new();
    }
    let Some(items) = body.get("articles").and_then(Value::as_array) else {
        return Vec::new();
    };

    let articles: Vec<Article> = items
        .iter()
        .take(max_articles)
        .map(|item| {
            let date = str_field(item, "date");
            let mut article = Article::new(str_field(item, "title"), str_field(item, "link"))
                .with_priority(1)
                .with_source(NAME);
            article.description = str_field(item, "description").to_string();
            article.publish_time = if date.is_empty() { today } else { date }.to_string();
            article
        })
        .filter(Article::is_identifiable)
        .collect();
    debug!(items = items.len(), kept = articles.len(), "Parsed Syft feed");
    articles
}
