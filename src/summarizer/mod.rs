//! Digest generation: compression, provider fallback, and offline fallback.
//!
//! # Submodules
//!
//! - [`compress`]: truncates article fields before they reach a model
//! - [`provider`]: the chat transport and chunk sinks
//! - [`engine`]: the ordered provider loop
//! - [`offline`]: the deterministic headline list
//!
//! [`summarize_with_policy`] is the only place that decides whether a failed
//! or unconfigured online run is downgraded to the offline digest.

pub mod compress;
pub mod engine;
pub mod offline;
pub mod provider;

use clap::ValueEnum;
use tracing::{info, warn};

use crate::models::Article;
pub use engine::{EngineOptions, SummarizeError, Summarizer};
pub use offline::{DEFAULT_OFFLINE_LIMIT, offline_summary};
pub use provider::{ChunkSink, ConsoleSink, OpenAiClient, ProviderCandidate};

/// How a caller wants the digest produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SummaryMode {
    /// Online when a provider is configured, offline otherwise.
    #[default]
    Auto,
    /// Online only; configuration or provider failures are errors.
    Online,
    /// Never contact a provider.
    Offline,
}

/// Where a digest came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestOrigin {
    Model,
    Offline,
}

/// Produce a digest according to `mode`.
///
/// - `Offline` always renders the headline list.
/// - `Online` propagates [`SummarizeError::NoProvider`] and
///   [`SummarizeError::Exhausted`].
/// - `Auto` downgrades `NoProvider` to offline, and downgrades `Exhausted`
///   only when `offline_on_failure` is set.
pub async fn summarize_with_policy(
    summarizer: &Summarizer,
    articles: &[Article],
    mode: SummaryMode,
    offline_on_failure: bool,
    stream: bool,
    sink: &mut dyn ChunkSink,
) -> Result<(String, DigestOrigin), SummarizeError> {
    if mode == SummaryMode::Offline {
        info!("Offline summary requested");
        return Ok((
            offline_summary(articles, DEFAULT_OFFLINE_LIMIT),
            DigestOrigin::Offline,
        ));
    }

    match summarizer.summarize(articles, stream, sink).await {
        Ok(text) => Ok((text, DigestOrigin::Model)),
        Err(SummarizeError::NoProvider) if mode == SummaryMode::Auto => {
            warn!("No API key configured; using offline summary");
            Ok((
                offline_summary(articles, DEFAULT_OFFLINE_LIMIT),
                DigestOrigin::Offline,
            ))
        }
        Err(e @ SummarizeError::Exhausted(_)) if mode == SummaryMode::Auto && offline_on_failure => {
            warn!(error = %e, "Every provider failed; using offline summary");
            Ok((
                offline_summary(articles, DEFAULT_OFFLINE_LIMIT),
                DigestOrigin::Offline,
            ))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::provider::{ChatRequest, ChatTransport, NullSink, ProviderError};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatTransport for FailingTransport {
        async fn complete(
            &self,
            _provider: &ProviderCandidate,
            _request: &ChatRequest,
            _sink: &mut dyn ChunkSink,
        ) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Malformed("down".to_string()))
        }
    }

    fn summarizer(with_provider: bool) -> (Summarizer, Arc<FailingTransport>) {
        let transport = Arc::new(FailingTransport {
            calls: AtomicUsize::new(0),
        });
        let providers = if with_provider {
            vec![ProviderCandidate {
                name: "primary".to_string(),
                base_url: "https://primary.example/v1".to_string(),
                api_key: "key".to_string(),
                model: "m".to_string(),
            }]
        } else {
            Vec::new()
        };
        (
            Summarizer::new(transport.clone(), providers, EngineOptions::default()),
            transport,
        )
    }

    fn articles() -> Vec<Article> {
        vec![Article::new("Headline number one", "https://a.com/1").with_priority(1)]
    }

    #[tokio::test]
    async fn test_offline_mode_never_calls_transport() {
        let (summarizer, transport) = summarizer(true);
        let (text, origin) = summarize_with_policy(
            &summarizer,
            &articles(),
            SummaryMode::Offline,
            false,
            false,
            &mut NullSink,
        )
        .await
        .unwrap();

        assert_eq!(origin, DigestOrigin::Offline);
        assert!(text.starts_with("1. 🔥Headline number one"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auto_without_provider_goes_offline() {
        let (summarizer, _) = summarizer(false);
        let (_, origin) = summarize_with_policy(
            &summarizer,
            &articles(),
            SummaryMode::Auto,
            false,
            false,
            &mut NullSink,
        )
        .await
        .unwrap();
        assert_eq!(origin, DigestOrigin::Offline);
    }

    #[tokio::test]
    async fn test_online_without_provider_is_an_error() {
        let (summarizer, _) = summarizer(false);
        let err = summarize_with_policy(
            &summarizer,
            &articles(),
            SummaryMode::Online,
            true,
            false,
            &mut NullSink,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SummarizeError::NoProvider));
    }

    #[tokio::test]
    async fn test_auto_exhausted_propagates_unless_configured() {
        let (summarizer, _) = summarizer(true);
        let err = summarize_with_policy(
            &summarizer,
            &articles(),
            SummaryMode::Auto,
            false,
            false,
            &mut NullSink,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SummarizeError::Exhausted(_)));

        let (_, origin) = summarize_with_policy(
            &summarizer,
            &articles(),
            SummaryMode::Auto,
            true,
            false,
            &mut NullSink,
        )
        .await
        .unwrap();
        assert_eq!(origin, DigestOrigin::Offline);
    }

    #[tokio::test]
    async fn test_online_exhausted_ignores_offline_on_failure() {
        let (summarizer, transport) = summarizer(true);
        let err = summarize_with_policy(
            &summarizer,
            &articles(),
            SummaryMode::Online,
            true,
            false,
            &mut NullSink,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SummarizeError::Exhausted(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
