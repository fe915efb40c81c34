//! Daily JSON and Markdown files.
//!
//! Everything is keyed by the UTC+8 calendar date:
//!
//! ```text
//! data/
//! └── 2025-11-08.json     # {"date": ..., "articles": [...]}
//! content/
//! └── 2025-11-08.md       # front matter + digest title + digest
//! ```

use std::error::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::models::DailyPayload;
use crate::utils::beijing_today;

/// Today's date key, `YYYY-MM-DD`.
pub fn today_ymd() -> String {
    beijing_today().format("%Y-%m-%d").to_string()
}

/// Today's date for display, `YYYY年MM月DD日`.
pub fn today_cn() -> String {
    beijing_today().format("%Y年%m月%d日").to_string()
}

/// Heading placed above the digest body.
pub fn digest_title(date_cn: &str) -> String {
    format!("🔥（{date_cn}）每日AI资讯一览✨")
}

/// Title line, blank line, then the digest.
pub fn digest_document(date_cn: &str, summary: &str) -> String {
    format!("{}\n\n{}", digest_title(date_cn), summary)
}

fn dated_path(dir: &str, date: &str, ext: &str) -> PathBuf {
    Path::new(dir).join(format!("{date}.{ext}"))
}

/// Write `payload` as pretty JSON to `{dir}/{date}.json`, creating `dir`.
///
/// An existing file for the same date is overwritten.
///
/// # Returns
///
/// The path that was written.
#[instrument(level = "info", skip_all, fields(dir = %dir, date = %date))]
pub async fn save_json(dir: &str, date: &str, payload: &DailyPayload) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(payload)?;

    if let Err(e) = fs::create_dir_all(dir).await {
        error!(error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = dated_path(dir, date, "json");
    fs::write(&path, json).await?;
    info!(path = %path.display(), articles = payload.articles.len(), "Wrote daily JSON");
    Ok(path)
}

/// Read `{dir}/{date}.json`.
///
/// # Returns
///
/// `Ok(None)` when no file exists for `date`; an error when the file exists
/// but cannot be read or is not a valid payload.
///
/// # Examples
///
/// ```ignore
/// match load_json("data", "2025-11-08").await? {
///     Some(payload) => println!("{} stored articles", payload.articles.len()),
///     None => println!("run `fetch` first"),
/// }
/// ```
#[instrument(level = "info", skip_all, fields(dir = %dir, date = %date))]
pub async fn load_json(dir: &str, date: &str) -> Result<Option<DailyPayload>, Box<dyn Error>> {
    let path = dated_path(dir, date, "json");
    let raw = match fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No stored JSON for date");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let payload: DailyPayload = serde_json::from_str(&raw)?;
    info!(path = %path.display(), articles = payload.articles.len(), "Loaded daily JSON");
    Ok(Some(payload))
}

/// Write `content` to `{dir}/{date}.md` behind a front matter block.
#[instrument(level = "info", skip_all, fields(dir = %dir, date = %date))]
pub async fn save_markdown(dir: &str, date: &str, content: &str) -> Result<PathBuf, Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(dir).await {
        error!(error = %e, "Failed to create Markdown dir");
        return Err(e.into());
    }

    let front_matter = format!("---\ntitle: AI 新闻日报 {date}\ndate: {date}\n---\n\n");
    let path = dated_path(dir, date, "md");
    fs::write(&path, front_matter + content).await?;
    info!(path = %path.display(), "Wrote Markdown digest");
    Ok(path)
}
