//! Shared utilities for CLI commands.

use std::fmt::Write as _;
use std::sync::LazyLock;

use anyhow::Context;
use chrono::{Days, NaiveDate, TimeZone};
use nt_core::DocumentId;
use regex::Regex;

use crate::cli::BlockRef;

/// Pre-compiled regex for relative date parsing.
static RELATIVE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(day|week)s?\s+ago$").expect("relative date pattern is valid")
});

/// Conservative bound for relative dates (~1000 years in days).
const MAX_RELATIVE_DAYS: u64 = 1000 * 365;

/// Parse a report date.
///
/// Supports:
/// - ISO dates: "2026-01-15"
/// - "today", "yesterday"
/// - Relative: "3 days ago", "1 week ago"
pub fn parse_date(s: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let s = s.trim();
    match s {
        "today" => return Ok(today),
        "yesterday" => {
            return today
                .checked_sub_days(Days::new(1))
                .context("date out of range");
        }
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    let Some(caps) = RELATIVE_DATE_RE.captures(s) else {
        anyhow::bail!(
            "Invalid date: {s}. Use YYYY-MM-DD, today, yesterday, or relative (e.g., '3 days ago')"
        );
    };

    let n: u64 = caps[1]
        .parse()
        .context("failed to parse number in relative date")?;
    let days = match &caps[2] {
        "day" => n,
        "week" => n.saturating_mul(7),
        unit => anyhow::bail!("Unknown date unit: {unit}"),
    };
    if days > MAX_RELATIVE_DAYS {
        anyhow::bail!("Relative date too far back: {n} {}", &caps[2]);
    }

    today
        .checked_sub_days(Days::new(days))
        .context("date out of range")
}

/// Parse a 1-based, dot-separated entry position into 0-based indices.
pub fn parse_entry_path(s: &str) -> anyhow::Result<Vec<usize>> {
    s.split('.')
        .map(|part| {
            let position: usize = part
                .trim()
                .parse()
                .with_context(|| format!("invalid entry position: {s}"))?;
            position
                .checked_sub(1)
                .with_context(|| format!("entry positions start at 1: {s}"))
        })
        .collect()
}

/// Validate a block reference into a document id and 0-based block index.
pub fn resolve_block(target: &BlockRef) -> anyhow::Result<(DocumentId, usize)> {
    let document = DocumentId::new(target.document.clone()).context("document path is empty")?;
    let index = target
        .block
        .checked_sub(1)
        .context("block numbers start at 1")?;
    Ok((document, index))
}

/// Formats seconds as `1d 2h 5m 3s`, omitting leading zero units.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3600;
    let minutes = seconds % 3600 / 60;
    let secs = seconds % 60;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{secs}s"));
    out
}

/// Formats epoch seconds with a strftime pattern in `tz`.
///
/// Returns an empty string for ambiguous times and for patterns chrono
/// cannot render.
pub fn format_timestamp<Tz>(timestamp: i64, format: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(dt) = tz.timestamp_opt(timestamp, 0).single() else {
        return String::new();
    };
    let mut out = String::new();
    if write!(out, "{}", dt.format(format)).is_err() {
        return String::new();
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_date_iso_and_keywords() {
        let today = date("2024-03-10");
        assert_eq!(parse_date("2024-01-15", today).unwrap(), date("2024-01-15"));
        assert_eq!(parse_date("today", today).unwrap(), today);
        assert_eq!(parse_date("yesterday", today).unwrap(), date("2024-03-09"));
    }

    #[test]
    fn test_parse_date_relative() {
        let today = date("2024-03-10");
        assert_eq!(parse_date("3 days ago", today).unwrap(), date("2024-03-07"));
        assert_eq!(parse_date("1 day ago", today).unwrap(), date("2024-03-09"));
        assert_eq!(parse_date("2 weeks ago", today).unwrap(), date("2024-02-25"));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        let today = date("2024-03-10");
        assert!(parse_date("next tuesday", today).is_err());
        assert!(parse_date("99999999 days ago", today).is_err());
    }

    #[test]
    fn test_parse_entry_path() {
        assert_eq!(parse_entry_path("2").unwrap(), vec![1]);
        assert_eq!(parse_entry_path("2.1").unwrap(), vec![1, 0]);
        assert!(parse_entry_path("0").is_err());
        assert!(parse_entry_path("a.1").is_err());
        assert!(parse_entry_path("").is_err());
    }

    #[test]
    fn test_resolve_block_is_one_based() {
        let target = BlockRef {
            document: "a.md".to_string(),
            block: 2,
        };
        let (document, index) = resolve_block(&target).unwrap();
        assert_eq!(document.as_str(), "a.md");
        assert_eq!(index, 1);

        let zero = BlockRef {
            document: "a.md".to_string(),
            block: 0,
        };
        assert!(resolve_block(&zero).is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(60), "1m 0s");
        assert_eq!(format_duration(3903), "1h 5m 3s");
        assert_eq!(format_duration(90_061), "1d 1h 1m 1s");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn test_format_timestamp_utc() {
        assert_eq!(
            format_timestamp(1_704_067_200, "%y-%m-%d %H:%M:%S", &Utc),
            "24-01-01 00:00:00"
        );
    }

    #[test]
    fn test_format_timestamp_bad_pattern_is_empty() {
        assert_eq!(format_timestamp(1_704_067_200, "%Q %H", &Utc), "");
    }
}
