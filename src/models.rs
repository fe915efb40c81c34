//! Data models shared by every stage of the pipeline.
//!
//! - [`Article`]: the uniform record each source adapter produces
//! - [`DailyPayload`]: the JSON blob persisted per date
//! - [`CompressedArticle`]: the trimmed view of an article sent to a model

use serde::{Deserialize, Serialize};

/// A news article as produced by a source adapter.
///
/// Every field except `title` and `link` may be empty. `publish_time` is
/// normalized to `YYYY-MM-DD` whenever the adapter could establish a date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Article {
    /// Headline.
    pub title: String,
    /// Absolute URL of the story.
    pub link: String,
    /// Short summary or snippet.
    pub description: String,
    /// Publication date, `YYYY-MM-DD` where known, empty otherwise.
    pub publish_time: String,
    /// Full extracted text; empty for adapters that only list headlines.
    pub content: String,
    /// 1 for confirmed fresh or curated stories, 0 otherwise.
    pub priority: i32,
    /// Identifier of the adapter that produced the record.
    pub source: String,
}

impl Article {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// A record is worth keeping only if it can be told apart from nothing.
    pub fn is_identifiable(&self) -> bool {
        !(self.title.trim().is_empty() && self.link.trim().is_empty())
    }
}

/// The per-date JSON document written after fetching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DailyPayload {
    /// `YYYY-MM-DD` in UTC+8.
    pub date: String,
    #[serde(default)]
    pub articles: Vec<Article>,
}

/// Article fields that survive compression before a model call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CompressedArticle {
    pub title: String,
    pub link: String,
    pub publish_time: String,
    pub description: String,
    pub priority: i32,
}
