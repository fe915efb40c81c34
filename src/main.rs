//! # Daily Report
//!
//! An AI news pipeline that pulls stories from several sources, removes
//! duplicates, and condenses the rest into a short Chinese daily digest with
//! an OpenAI-compatible model.
//!
//! ## Features
//!
//! - Fetches from AIBase, TechCrunch, The Verge, and the Syft newsletter feed
//!   concurrently; a failing source never blocks the others
//! - Deduplicates by normalized title and link domain, preferring fresh stories
//! - Tries each configured provider in order and streams the digest to stdout
//! - Falls back to a deterministic headline list when no model is available
//! - Writes `data/{date}.json` and `content/{date}.md`, keyed by UTC+8 date
//!
//! ## Usage
//!
//! ```sh
//! daily_report run
//! daily_report fetch
//! daily_report summarize --offline
//! daily_report test
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: every enabled source runs as its own task with a timeout
//! 2. **Deduplication**: one record per story, highest priority first
//! 3. **Persisting**: the day's records are saved as JSON
//! 4. **Summarizing**: compressed records go to the provider chain
//! 5. **Output**: the digest is written as Markdown with front matter

use clap::Parser;
use itertools::Itertools;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dedupe;
mod models;
mod sources;
mod storage;
mod summarizer;
mod utils;

use cli::{Cli, Command};
use config::Settings;
use models::{Article, DailyPayload};
use sources::Dispatcher;
use summarizer::{
    ConsoleSink, DigestOrigin, EngineOptions, OpenAiClient, SummaryMode, Summarizer,
    summarize_with_policy,
};
use utils::{ensure_writable_dir, truncate_for_log};

/// Overall deadline for one chat completion, streamed or not.
const LLM_TIMEOUT: Duration = Duration::from_secs(300);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("daily_report starting up");

    let args = Cli::parse();
    debug!(config = %args.config, command = ?args.command, "Parsed CLI arguments");

    let settings = Settings::load(&args.config)?;

    match args.command {
        Command::Run(summary) => run(&settings, summary.effective_mode()).await?,
        Command::Fetch => {
            fetch(&settings, &storage::today_ymd()).await?;
        }
        Command::Summarize(summary) => summarize(&settings, summary.effective_mode()).await?,
        Command::Test => test_connection(&settings).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Fetch, then write the digest for today's records.
#[instrument(level = "info", skip_all, fields(mode = ?mode))]
async fn run(settings: &Settings, mode: SummaryMode) -> Result<(), Box<dyn Error>> {
    let date = storage::today_ymd();
    let articles = fetch(settings, &date).await?;
    write_digest(settings, &date, &articles, mode).await
}

/// Fetch from every enabled source, deduplicate, and save the JSON for `date`.
#[instrument(level = "info", skip_all, fields(%date))]
async fn fetch(settings: &Settings, date: &str) -> Result<Vec<Article>, Box<dyn Error>> {
    // Early check: ensure JSON output dir is writable
    if let Err(e) = ensure_writable_dir(&settings.json_dir).await {
        error!(
            path = %settings.json_dir,
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let dispatcher = Dispatcher::from_settings(settings);
    info!(sources = ?dispatcher.source_names(), "Fetching news");
    let fetched = dispatcher.fetch_all(settings.max_articles).await;

    let before = fetched.len();
    let articles = dedupe::dedupe(fetched);
    info!(before, after = articles.len(), "Deduplicated articles");
    for (source, count) in articles
        .iter()
        .counts_by(|a| a.source.clone())
        .into_iter()
        .sorted()
    {
        info!(%source, count, "Articles kept per source");
    }

    let payload = DailyPayload {
        date: date.to_string(),
        articles,
    };
    if let Err(e) = storage::save_json(&settings.json_dir, date, &payload).await {
        error!(error = %e, "Failed to write daily JSON");
        return Err(e);
    }
    Ok(payload.articles)
}

/// Summarize today's saved JSON.
#[instrument(level = "info", skip_all, fields(mode = ?mode))]
async fn summarize(settings: &Settings, mode: SummaryMode) -> Result<(), Box<dyn Error>> {
    let date = storage::today_ymd();
    let Some(payload) = storage::load_json(&settings.json_dir, &date).await? else {
        error!(%date, dir = %settings.json_dir, "No data found; run `fetch` first");
        return Err(format!("no stored articles for {date}").into());
    };
    info!(count = payload.articles.len(), %date, "Summarizing stored articles");
    write_digest(settings, &date, &payload.articles, mode).await
}

/// Send a greeting to the primary provider and report its reply.
#[instrument(level = "info", skip_all)]
async fn test_connection(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let summarizer = build_summarizer(settings)?;
    match summarizer.check_connection().await {
        Ok((model, reply)) => {
            info!(%model, reply = %truncate_for_log(&reply, 200), "Provider connection OK");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Provider connection failed");
            Err(e.into())
        }
    }
}

fn build_summarizer(settings: &Settings) -> Result<Summarizer, Box<dyn Error>> {
    let http = reqwest::Client::builder().timeout(LLM_TIMEOUT).build()?;
    let options = EngineOptions {
        title_max: settings.title_max,
        desc_max: settings.desc_max,
        max_tokens: settings.max_output,
        prompt_path: Some(settings.prompt_path.clone()),
    };
    Ok(Summarizer::new(
        Arc::new(OpenAiClient::new(http)),
        settings.providers.clone(),
        options,
    ))
}

/// Produce the digest for `articles` and save it as today's Markdown.
async fn write_digest(
    settings: &Settings,
    date: &str,
    articles: &[Article],
    mode: SummaryMode,
) -> Result<(), Box<dyn Error>> {
    if let Err(e) = ensure_writable_dir(&settings.md_dir).await {
        error!(
            path = %settings.md_dir,
            error = %e,
            "Markdown output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let summarizer = build_summarizer(settings)?;
    debug!(
        providers = ?summarizer.providers().iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        "Provider chain"
    );
    let mut sink = ConsoleSink;
    let (summary, origin) = summarize_with_policy(
        &summarizer,
        articles,
        mode,
        settings.offline_on_failure,
        true,
        &mut sink,
    )
    .await?;
    if origin == DigestOrigin::Offline {
        warn!("Digest produced offline; no model was used");
    }

    let document = storage::digest_document(&storage::today_cn(), &summary);
    let path = storage::save_markdown(&settings.md_dir, date, &document).await?;
    info!(path = %path.display(), ?origin, "Daily digest written");
    Ok(())
}
