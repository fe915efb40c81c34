//! Command-line interface definitions for the daily report pipeline.
//!
//! Every subcommand reads the same `config.yaml`; its path can be given with
//! `--config` or the `DAILY_REPORT_CONFIG` environment variable.

use clap::{Args, Parser, Subcommand};

use crate::summarizer::SummaryMode;

/// Fetch AI news, deduplicate it, and write a daily digest.
///
/// # Examples
///
/// ```sh
/// # Full pipeline
/// daily_report run
///
/// # Fetch only, then summarize later without a model
/// daily_report fetch
/// daily_report summarize --offline
///
/// # Check the configured provider
/// daily_report --config ./my.yaml test
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.yaml
    #[arg(short, long, global = true, env = "DAILY_REPORT_CONFIG", default_value = "config.yaml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, deduplicate, save JSON, summarize, and save Markdown
    Run(SummaryArgs),
    /// Fetch, deduplicate, and save JSON only
    Fetch,
    /// Summarize today's saved JSON into Markdown
    Summarize(SummaryArgs),
    /// Check connectivity to the primary provider
    Test,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct SummaryArgs {
    /// How the digest is produced
    #[arg(long, value_enum, default_value_t = SummaryMode::Auto)]
    pub mode: SummaryMode,

    /// Shorthand for `--mode offline`
    #[arg(long, conflicts_with = "mode")]
    pub offline: bool,
}

impl SummaryArgs {
    pub fn effective_mode(&self) -> SummaryMode {
        if self.offline {
            SummaryMode::Offline
        } else {
            self.mode
        }
    }
}
