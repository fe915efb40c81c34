//! Utility functions for time, string truncation, and file system checks.
//!
//! - UTC+8 clock helpers: every date key in the pipeline is computed in a
//!   fixed Beijing offset, independent of the host timezone
//! - Character-safe truncation for payloads and log lines
//! - Output directory validation

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

const BEIJING_OFFSET_SECS: i32 = 8 * 3600;

/// The fixed UTC+8 offset used for all date keys.
pub fn beijing_offset() -> FixedOffset {
    FixedOffset::east_opt(BEIJING_OFFSET_SECS).expect("UTC+8 is a valid offset")
}

/// Current time in UTC+8.
pub fn beijing_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&beijing_offset())
}

/// Current calendar date in UTC+8.
pub fn beijing_today() -> NaiveDate {
    beijing_now().date_naive()
}

/// Keep at most `max` characters of `s`.
///
/// Counts `char`s rather than bytes so multi-byte text (CJK titles, emoji)
/// is never split mid-codepoint. No ellipsis is appended.
///
/// # Arguments
///
/// * `s` - The text to cut
/// * `max` - Maximum number of characters to keep
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_chars("今日要闻速递", 4), "今日要闻");
/// assert_eq!(truncate_chars("short", 100), "short");
/// ```
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the count of
/// dropped characters appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        format!("{}…(+{} chars)", truncate_chars(s, max), total - max)
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a scratch file.
///
/// # Arguments
///
/// * `path` - Directory the pipeline is about to write into
///
/// # Returns
///
/// `Ok(())` when a file could be created there, otherwise the I/O error.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let scratch = format!("{}/..__write_check__", path.trim_end_matches('/'));
    match stdfs::File::create(&scratch) {
        Ok(_) => {
            let _ = stdfs::remove_file(&scratch);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 chars)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "每日资讯".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with("每日资…"));
    }

    #[test]
    fn test_truncate_chars_counts_codepoints() {
        assert_eq!(truncate_chars("每日AI资讯", 4), "每日AI");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_beijing_now_is_utc_plus_eight() {
        let now = beijing_now();
        assert_eq!(now.offset().local_minus_utc(), 8 * 3600);
        let utc_hour = Utc::now().hour();
        // Allow for the hour rolling over between the two calls.
        let diff = (now.hour() + 24 - utc_hour) % 24;
        assert!(diff == 8 || diff == 9);
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b");
        let nested = nested.to_str().unwrap();

        ensure_writable_dir(nested).await.unwrap();
        assert!(std::path::Path::new(nested).is_dir());
    }
}
