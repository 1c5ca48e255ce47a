//! Show command: one tracker's entries as a markdown table or CSV.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::TimeZone;
use nt_core::{Clock, Tracker};
use nt_vault::{DocumentStore, SyncEngine};

use super::util::{format_duration, format_timestamp, resolve_block};
use crate::Config;
use crate::cli::BlockRef;

const HEADER: [&str; 4] = ["task", "Start time", "End time", "Duration"];

/// Name, start, end and duration cells for every entry in pre-order.
///
/// Running leaves have an empty duration; parents always show the sum of
/// their parts.
fn table_rows<Tz>(
    tracker: &Tracker,
    now: i64,
    format: &str,
    tz: &Tz,
    indent: bool,
) -> Vec<[String; 4]>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let stamp = |t: Option<i64>| {
        t.map(|t| format_timestamp(t, format, tz))
            .unwrap_or_default()
    };

    tracker
        .entries
        .walk()
        .into_iter()
        .filter_map(|(id, depth)| {
            let entry = tracker.entries.get(id)?;
            let name = if indent {
                format!("{}{}", "  ".repeat(depth), entry.name)
            } else {
                entry.name.clone()
            };
            let duration = if entry.end_time.is_some() || !entry.is_leaf() {
                format_duration(tracker.entries.duration(id, now))
            } else {
                String::new()
            };
            Some([name, stamp(entry.start_time), stamp(entry.end_time), duration])
        })
        .collect()
}

/// Renders a padded markdown table with a bold total row.
pub fn markdown_table<Tz>(tracker: &Tracker, now: i64, format: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut rows = vec![HEADER.map(str::to_string)];
    rows.extend(table_rows(tracker, now, format, tz, true));
    rows.push([
        "**Total**".to_string(),
        String::new(),
        String::new(),
        format!("**{}**", format_duration(tracker.entries.total_duration(now))),
    ]);

    let widths: [usize; 4] = std::array::from_fn(|col| {
        rows.iter()
            .map(|row| row[col].chars().count())
            .max()
            .unwrap_or(0)
    });

    let mut out = String::new();
    for (index, row) in rows.iter().enumerate() {
        if index == 1 {
            let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
            let _ = writeln!(out, "{}", rule.join(" | "));
        }
        let cells: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", cells.join(" | ").trim_end());
    }
    out
}

/// Renders one CSV line per entry, without header or total.
pub fn csv<Tz>(tracker: &Tracker, now: i64, format: &str, delimiter: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    table_rows(tracker, now, format, tz, false)
        .into_iter()
        .fold(String::new(), |mut out, row| {
            let _ = writeln!(out, "{}", row.join(delimiter));
            out
        })
}

pub async fn run<S, C, W, Tz>(
    writer: &mut W,
    engine: &SyncEngine<S, C>,
    config: &Config,
    target: &BlockRef,
    as_csv: bool,
    tz: &Tz,
) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let (document, index) = resolve_block(target)?;
    let tracker = engine.read_block(&document, index).await?;
    let now = engine.clock().now();

    let output = if as_csv {
        csv(
            &tracker,
            now,
            &config.timestamp_format,
            &config.csv_delimiter,
            tz,
        )
    } else {
        markdown_table(&tracker, now, &config.timestamp_format, tz)
    };
    write!(writer, "{output}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use insta::assert_snapshot;
    use nt_core::{EntryForest, EntryRecord};

    use super::*;

    const FORMAT: &str = "%y-%m-%d %H:%M:%S";
    const BASE: i64 = 1_704_067_200; // 2024-01-01 00:00:00 UTC

    fn sample() -> Tracker {
        Tracker {
            entries: EntryForest::from(vec![
                EntryRecord::leaf("write", BASE, Some(BASE + 3903)),
                EntryRecord {
                    name: "review".to_string(),
                    sub_entries: Some(vec![
                        EntryRecord::leaf("Part 1", BASE + 7200, Some(BASE + 7800)),
                        EntryRecord::leaf("Part 2", BASE + 9000, None),
                    ]),
                    ..EntryRecord::default()
                },
            ]),
            ..Tracker::default()
        }
    }

    #[test]
    fn markdown_table_pads_and_totals() {
        let table = markdown_table(&sample(), BASE + 9060, FORMAT, &Utc);

        assert_snapshot!(table, @r"
        task      | Start time        | End time          | Duration
        --------- | ----------------- | ----------------- | -------------
        write     | 24-01-01 00:00:00 | 24-01-01 01:05:03 | 1h 5m 3s
        review    |                   |                   | 11m 0s
          Part 1  | 24-01-01 02:00:00 | 24-01-01 02:10:00 | 10m 0s
          Part 2  | 24-01-01 02:30:00 |                   |
        **Total** |                   |                   | **1h 16m 3s**
        ");
    }

    #[test]
    fn csv_uses_configured_delimiter() {
        let out = csv(&sample(), BASE + 9060, FORMAT, ";", &Utc);

        assert_eq!(
            out,
            "write;24-01-01 00:00:00;24-01-01 01:05:03;1h 5m 3s\n\
             review;;;11m 0s\n\
             Part 1;24-01-01 02:00:00;24-01-01 02:10:00;10m 0s\n\
             Part 2;24-01-01 02:30:00;;\n"
        );
    }

    #[test]
    fn markdown_table_of_empty_tracker() {
        let table = markdown_table(&Tracker::default(), 0, FORMAT, &Utc);
        assert_eq!(
            table,
            "task      | Start time | End time | Duration\n\
             --------- | ---------- | -------- | --------\n\
             **Total** |            |          | **0s**\n"
        );
    }
}
