//! Cross-tracker aggregation.
//!
//! Flattens every leaf of every tracker into [`ReportEntry`] intervals clipped
//! to a window, then buckets them by label and calendar day. Nothing here
//! formats output beyond the numeric hour cells.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone};
use serde::Serialize;

use crate::tracker::Tracker;

/// Label used when a tracker has neither project nor client.
pub const NO_PROJECT: &str = "(no project)";

/// A leaf interval clipped to a report window.
///
/// `label` comes from the owning tracker's project and client, not from the
/// entry name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub label: String,
    pub start_time: i64,
    pub end_time: i64,
}

impl ReportEntry {
    pub const fn duration(&self) -> i64 {
        self.end_time - self.start_time
    }
}

/// One local calendar day as an inclusive `[start, end]` range of epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Day {
    pub date: NaiveDate,
    pub start: i64,
    pub end: i64,
}

/// Builds a report label: `project/client`, either one alone, or [`NO_PROJECT`].
///
/// Empty strings count as absent.
pub fn to_label(project: Option<&str>, client: Option<&str>) -> String {
    let project = project.filter(|p| !p.is_empty());
    let client = client.filter(|c| !c.is_empty());
    match (project, client) {
        (Some(project), Some(client)) => format!("{project}/{client}"),
        (Some(label), None) | (None, Some(label)) => label.to_string(),
        (None, None) => NO_PROJECT.to_string(),
    }
}

/// Collects every leaf overlapping `[window_start, window_end]`, clipped to it.
///
/// Running leaves end at `now`. Leaves without a start time are skipped.
/// Output follows tracker order, then pre-order within each tracker.
pub fn collect_tracks<'a>(
    trackers: impl IntoIterator<Item = &'a Tracker>,
    window_start: i64,
    window_end: i64,
    now: i64,
) -> Vec<ReportEntry> {
    let mut records = Vec::new();
    for tracker in trackers {
        let label = to_label(tracker.project.as_deref(), tracker.client.as_deref());
        for id in tracker.entries.leaves() {
            let Some(leaf) = tracker.entries.get(id) else {
                continue;
            };
            let Some(start) = leaf.start_time else {
                continue;
            };
            let end = leaf.end_time.unwrap_or(now);
            if end < window_start || start > window_end {
                continue;
            }
            records.push(ReportEntry {
                label: label.clone(),
                start_time: start.max(window_start),
                end_time: end.min(window_end),
            });
        }
    }
    tracing::debug!(count = records.len(), "collected report entries");
    records
}

/// Distinct labels, sorted ascending.
pub fn find_projects(records: &[ReportEntry]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.label.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Local midnight of `date` in `tz`.
///
/// Ambiguous midnights (DST fall-back) take the earlier instant; a midnight
/// skipped by a spring-forward gap falls back to 01:00.
pub fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => {
            let one_am = midnight + chrono::Duration::hours(1);
            tz.from_local_datetime(&one_am)
                .earliest()
                .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
        }
    }
}

/// Every local calendar day intersecting `[start, end]`, both endpoints' days
/// included.
pub fn find_days<Tz: TimeZone>(start: i64, end: i64, tz: &Tz) -> Vec<Day> {
    let (Some(first), Some(last)) = (
        tz.timestamp_opt(start, 0).single(),
        tz.timestamp_opt(end, 0).single(),
    ) else {
        return Vec::new();
    };

    let mut days = Vec::new();
    let last = last.date_naive();
    let mut date = first.date_naive();
    while date <= last {
        let Some(next) = date.checked_add_days(Days::new(1)) else {
            break;
        };
        days.push(Day {
            date,
            start: local_midnight(date, tz).timestamp(),
            end: local_midnight(next, tz).timestamp() - 1,
        });
        date = next;
    }
    days
}

/// Seconds logged for `project` (or every label) within `day` (or in total).
///
/// With a day, each record is clipped to that day's bounds; without one the
/// record's full duration counts.
pub fn day_seconds(project: Option<&str>, day: Option<&Day>, records: &[ReportEntry]) -> i64 {
    records
        .iter()
        .filter(|record| project.is_none_or(|project| record.label == project))
        .map(|record| match day {
            Some(day) => {
                if record.end_time < day.start || record.start_time > day.end {
                    0
                } else {
                    record.end_time.min(day.end) - record.start_time.max(day.start)
                }
            }
            None => record.duration(),
        })
        .sum()
}

/// Like [`day_seconds`], formatted as hours.
pub fn day_sum(project: Option<&str>, day: Option<&Day>, records: &[ReportEntry]) -> String {
    format_hours(day_seconds(project, day, records))
}

/// Hours with at most two decimals and no trailing zeros (`5400` -> `1.5`).
#[allow(clippy::cast_precision_loss)]
pub fn format_hours(seconds: i64) -> String {
    let hours = seconds as f64 / 3600.0;
    let formatted = format!("{hours:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
