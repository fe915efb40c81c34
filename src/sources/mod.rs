//! News source adapters and the dispatcher that runs them.
//!
//! Each adapter turns one external source into zero or more [`Article`]s.
//! Adapters report problems through [`SourceError`]; the [`Dispatcher`] is the
//! single place where those errors (and panics, and timeouts) are absorbed so
//! one broken source never costs the others their results.
//!
//! # Supported Sources
//!
//! | Name | Module | Method | Notes |
//! |------|--------|--------|-------|
//! | `aibase` | [`aibase`] | HTML scraping | One daily digest, only if dated today |
//! | `techcrunch` | [`listing`] | HTML scraping | Homepage river, dated URLs |
//! | `theverge` | [`listing`] | HTML scraping | AI section |
//! | `syft` | [`syft`] | JSON endpoint | Curated newsletter items; needs URL and secret |

pub mod aibase;
pub mod html;
pub mod http;
pub mod listing;
pub mod syft;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Settings;
use crate::models::Article;

/// Upper bound on one adapter's whole fetch, including every request it makes.
pub const SOURCE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("unexpected payload: {0}")]
    Parse(String),
}

/// One news source.
#[async_trait]
pub trait Source: Send + Sync {
    /// Identifier written into each record's `source` field.
    fn name(&self) -> &str;

    /// Retrieve up to `max_articles` records. The cap is advisory; some
    /// sources return at most one record.
    async fn fetch(&self, max_articles: usize) -> Result<Vec<Article>, SourceError>;
}

pub type SourceFactory = fn(&Settings) -> Result<Arc<dyn Source>, SourceError>;

/// Every known source, in dispatch order.
pub fn registry() -> Vec<(&'static str, SourceFactory)> {
    vec![
        ("aibase", build_aibase as SourceFactory),
        ("techcrunch", build_techcrunch as SourceFactory),
        ("theverge", build_theverge as SourceFactory),
        ("syft", build_syft as SourceFactory),
    ]
}

fn build_aibase(_: &Settings) -> Result<Arc<dyn Source>, SourceError> {
    Ok(Arc::new(aibase::AiBaseSource::new()?))
}

fn build_techcrunch(_: &Settings) -> Result<Arc<dyn Source>, SourceError> {
    Ok(Arc::new(listing::ListingSource::techcrunch()?))
}

fn build_theverge(_: &Settings) -> Result<Arc<dyn Source>, SourceError> {
    Ok(Arc::new(listing::ListingSource::theverge()?))
}

fn build_syft(settings: &Settings) -> Result<Arc<dyn Source>, SourceError> {
    Ok(Arc::new(syft::SyftSource::new(
        &settings.syft_web_app_url,
        &settings.syft_secret_key,
    )?))
}

/// Runs a set of sources concurrently and merges their output.
pub struct Dispatcher {
    sources: Vec<Arc<dyn Source>>,
    timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sources", &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(sources: Vec<Arc<dyn Source>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    /// Build the enabled sources from the registry, in registry order.
    #[instrument(level = "info", skip_all)]
    pub fn from_settings(settings: &Settings) -> Self {
        let known: Vec<&str> = registry().iter().map(|(name, _)| *name).collect();
        for (name, _) in &settings.sources {
            if !known.contains(&name.as_str()) {
                warn!(source = %name, "Unknown source in config; ignoring");
            }
        }

        let mut sources = Vec::new();
        for (name, factory) in registry() {
            if !settings.is_source_enabled(name) {
                debug!(source = name, "Source disabled");
                continue;
            }
            match factory(settings) {
                Ok(source) => sources.push(source),
                Err(e) => error!(source = name, error = %e, "Failed to construct source"),
            }
        }
        if sources.is_empty() {
            warn!("No sources enabled");
        }
        Self::new(sources, SOURCE_TIMEOUT)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Fetch from every source in parallel.
    ///
    /// A source that errors, panics, or exceeds the timeout contributes
    /// nothing. Results are concatenated in source order.
    #[instrument(level = "info", skip_all, fields(sources = self.sources.len(), max_articles = max_articles))]
    pub async fn fetch_all(&self, max_articles: usize) -> Vec<Article> {
        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let timeout = self.timeout;
                tokio::spawn(async move { tokio::time::timeout(timeout, source.fetch(max_articles)).await })
            })
            .collect();

        let outcomes = join_all(handles).await;

        let mut articles = Vec::new();
        for (source, outcome) in self.sources.iter().zip(outcomes) {
            let name = source.name();
            match outcome {
                Ok(Ok(Ok(fetched))) => {
                    let before = fetched.len();
                    let kept: Vec<Article> = fetched
                        .into_iter()
                        .filter(Article::is_identifiable)
                        .map(|mut a| {
                            if a.source.is_empty() {
                                a.source = name.to_string();
                            }
                            a
                        })
                        .collect();
                    if kept.len() < before {
                        debug!(source = name, dropped = before - kept.len(), "Dropped records without title or link");
                    }
                    info!(source = name, count = kept.len(), "Source fetched");
                    articles.extend(kept);
                }
                Ok(Ok(Err(e))) => warn!(source = name, error = %e, "Source failed"),
                Ok(Err(_)) => warn!(source = name, timeout_secs = self.timeout.as_secs(), "Source timed out"),
                Err(e) => error!(source = name, error = %e, "Source task aborted"),
            }
        }
        info!(total = articles.len(), "Fetched from all sources");
        articles
    }
}
