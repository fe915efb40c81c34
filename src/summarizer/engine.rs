//! Ordered provider fallback for digest generation.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::compress::compress;
use super::provider::{
    ChatMessage, ChatRequest, ChatTransport, ChunkSink, ProviderCandidate, TEMPERATURE,
};
use crate::models::{Article, CompressedArticle};

/// Returned for an empty article list.
pub const NO_NEWS_PLACEHOLDER: &str = "暂无新闻";

/// System prompt used when the configured prompt file does not exist.
pub const DEFAULT_PROMPT: &str = "你是一个专业的AI资讯编辑，请将新闻整理成简洁的中文日报。";

/// One provider's failure, kept for the aggregate error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("no model provider configured (set MODELSCOPE_API_KEY or summarize.providers)")]
    NoProvider,
    #[error("all providers failed: {}", format_failures(.0))]
    Exhausted(Vec<ProviderFailure>),
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Settings the engine needs per call.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub title_max: usize,
    pub desc_max: usize,
    pub max_tokens: u32,
    /// `None` or a missing file selects [`DEFAULT_PROMPT`].
    pub prompt_path: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            title_max: 150,
            desc_max: 300,
            max_tokens: 2000,
            prompt_path: None,
        }
    }
}

/// Tries each provider in order until one answers.
pub struct Summarizer {
    transport: Arc<dyn ChatTransport>,
    providers: Vec<ProviderCandidate>,
    options: EngineOptions,
}

impl fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Summarizer")
            .field("providers", &self.providers)
            .field("options", &self.options)
            .finish()
    }
}

impl Summarizer {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        providers: Vec<ProviderCandidate>,
        options: EngineOptions,
    ) -> Self {
        Self {
            transport,
            providers,
            options,
        }
    }

    pub fn providers(&self) -> &[ProviderCandidate] {
        &self.providers
    }

    /// Condense `articles` into a digest.
    ///
    /// With `stream` set, content is pushed to `sink` as it arrives; the
    /// returned string is the full concatenation either way.
    #[instrument(level = "info", skip_all, fields(articles = articles.len(), stream = stream))]
    pub async fn summarize(
        &self,
        articles: &[Article],
        stream: bool,
        sink: &mut dyn ChunkSink,
    ) -> Result<String, SummarizeError> {
        if articles.is_empty() {
            info!("No articles; returning placeholder");
            return Ok(NO_NEWS_PLACEHOLDER.to_string());
        }
        if self.providers.is_empty() {
            return Err(SummarizeError::NoProvider);
        }

        let compressed = compress(articles, self.options.title_max, self.options.desc_max);
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(load_prompt(self.options.prompt_path.as_deref()).await),
                ChatMessage::user(user_payload(&compressed)),
            ],
            max_tokens: self.options.max_tokens,
            temperature: TEMPERATURE,
            stream,
        };

        let mut failures = Vec::new();
        for provider in &self.providers {
            info!(provider = %provider.name, model = %provider.model, "Requesting digest");
            let mut tracked = TrackingSink::new(sink);
            match self.transport.complete(provider, &request, &mut tracked).await {
                Ok(text) => {
                    info!(provider = %provider.name, chars = text.chars().count(), "Digest generated");
                    return Ok(text);
                }
                Err(e) => {
                    if tracked.chunks > 0 && !tracked.finished {
                        warn!(
                            provider = %provider.name,
                            chunks = tracked.chunks,
                            "Discarding partial streamed output"
                        );
                        tracked.finish();
                    }
                    warn!(provider = %provider.name, error = %e, "Provider failed; trying next");
                    failures.push(ProviderFailure {
                        provider: provider.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Err(SummarizeError::Exhausted(failures))
    }

    /// Send a one-line greeting to the primary provider.
    #[instrument(level = "info", skip_all)]
    pub async fn check_connection(&self) -> Result<(String, String), SummarizeError> {
        let provider = self.providers.first().ok_or(SummarizeError::NoProvider)?;
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system("You are a helpful assistant."),
                ChatMessage::user("你好，请用一句话介绍自己。"),
            ],
            max_tokens: 200,
            temperature: TEMPERATURE,
            stream: false,
        };
        let mut sink = super::provider::NullSink;
        self.transport
            .complete(provider, &request, &mut sink)
            .await
            .map(|reply| (provider.model.clone(), reply))
            .map_err(|e| {
                SummarizeError::Exhausted(vec![ProviderFailure {
                    provider: provider.name.clone(),
                    reason: e.to_string(),
                }])
            })
    }
}

/// Counts what one provider pushed through the caller's sink.
struct TrackingSink<'a> {
    inner: &'a mut dyn ChunkSink,
    chunks: usize,
    finished: bool,
}

impl<'a> TrackingSink<'a> {
    fn new(inner: &'a mut dyn ChunkSink) -> Self {
        Self {
            inner,
            chunks: 0,
            finished: false,
        }
    }
}

impl ChunkSink for TrackingSink<'_> {
    fn on_chunk(&mut self, chunk: &str) {
        self.chunks += 1;
        self.inner.on_chunk(chunk);
    }

    fn finish(&mut self) {
        self.finished = true;
        self.inner.finish();
    }
}

/// The user message: `{"articles": [...]}` as pretty JSON.
fn user_payload(compressed: &[CompressedArticle]) -> String {
    let value = serde_json::json!({ "articles": compressed });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

/// Read the system prompt, falling back to [`DEFAULT_PROMPT`].
pub async fn load_prompt(path: Option<&str>) -> String {
    let Some(path) = path else {
        return DEFAULT_PROMPT.to_string();
    };
    if !Path::new(path).exists() {
        return DEFAULT_PROMPT.to_string();
    }
    match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!(%path, error = %e, "Failed to read prompt file; using built-in prompt");
            DEFAULT_PROMPT.to_string()
        }
    }
}
