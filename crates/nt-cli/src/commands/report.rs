//! Report command for tracked hours across the vault.
//!
//! This module implements `nt report --from D [--to D]`: every leaf in the
//! vault is clipped to the local-day range, then bucketed into a
//! project × day grid of hours (markdown or JSON), or listed entry by entry.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use nt_core::Clock;
use nt_core::report::{self, Day, ReportEntry};
use nt_vault::{DocumentStore, SyncEngine};
use serde::Serialize;

use super::util::format_timestamp;

/// Hours logged under one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRow {
    pub project: String,
    /// One cell per report day.
    pub hours: Vec<String>,
    pub total: String,
}

/// Computed report data.
#[derive(Debug, Serialize)]
pub struct ReportData {
    pub generated_at: String,
    pub timezone: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<NaiveDate>,
    pub projects: Vec<ProjectRow>,
    /// Column totals, one per day.
    pub day_totals: Vec<String>,
    pub total: String,
    #[serde(skip)]
    pub entries: Vec<ReportEntry>,
}

// ========== Window Calculation ==========

/// Epoch bounds of the local days `from..=to`, both inclusive.
pub fn window<Tz: TimeZone>(from: NaiveDate, to: NaiveDate, tz: &Tz) -> Result<(i64, i64)> {
    if to < from {
        anyhow::bail!("--to ({to}) is before --from ({from})");
    }
    let Some(after) = to.checked_add_days(Days::new(1)) else {
        anyhow::bail!("date out of range: {to}");
    };
    let start = report::local_midnight(from, tz).timestamp();
    let end = report::local_midnight(after, tz).timestamp() - 1;
    Ok((start, end))
}

// ========== Report Generation ==========

/// Builds the project × day grid from clipped entries.
pub fn build_report<Tz: TimeZone>(
    entries: Vec<ReportEntry>,
    window: (i64, i64),
    range: (NaiveDate, NaiveDate),
    tz: &Tz,
    timezone: String,
    generated_at: DateTime<Utc>,
) -> ReportData {
    let days: Vec<Day> = report::find_days(window.0, window.1, tz);
    let projects = report::find_projects(&entries)
        .into_iter()
        .map(|project| ProjectRow {
            hours: days
                .iter()
                .map(|day| report::day_sum(Some(project.as_str()), Some(day), &entries))
                .collect(),
            total: report::day_sum(Some(project.as_str()), None, &entries),
            project,
        })
        .collect();

    ReportData {
        generated_at: generated_at.to_rfc3339(),
        timezone,
        from: range.0,
        to: range.1,
        days: days.iter().map(|day| day.date).collect(),
        projects,
        day_totals: days
            .iter()
            .map(|day| report::day_sum(None, Some(day), &entries))
            .collect(),
        total: report::day_sum(None, None, &entries),
        entries,
    }
}

// ========== Report Formatting ==========

fn push_table(output: &mut String, rows: &[Vec<String>]) {
    let columns = rows.first().map_or(0, Vec::len);
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    for (index, row) in rows.iter().enumerate() {
        if index == 1 {
            let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
            let _ = writeln!(output, "| {} |", rule.join(" | "));
        }
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(output, "| {} |", cells.join(" | "));
    }
}

/// Formats the day grid as a markdown table.
pub fn format_report(data: &ReportData) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Hours from {} to {} ({})",
        data.from, data.to, data.timezone
    );
    let _ = writeln!(output);

    if data.projects.is_empty() {
        let _ = writeln!(output, "No time tracked in this range.");
        return output;
    }

    let mut rows = Vec::with_capacity(data.projects.len() + 2);
    let mut header = vec!["Project".to_string()];
    header.extend(data.days.iter().map(|day| day.format("%m-%d").to_string()));
    header.push("Total".to_string());
    rows.push(header);

    for row in &data.projects {
        let mut cells = vec![row.project.clone()];
        cells.extend(row.hours.iter().cloned());
        cells.push(row.total.clone());
        rows.push(cells);
    }

    let mut totals = vec!["**Total**".to_string()];
    totals.extend(data.day_totals.iter().cloned());
    totals.push(format!("**{}**", data.total));
    rows.push(totals);

    push_table(&mut output, &rows);
    output
}

/// Formats the clipped entries, one row each.
pub fn format_entries<Tz>(data: &ReportData, timestamp_format: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut rows = vec![vec![
        "Project".to_string(),
        "Start time".to_string(),
        "End time".to_string(),
        "Hours".to_string(),
    ]];
    for entry in &data.entries {
        rows.push(vec![
            entry.label.clone(),
            format_timestamp(entry.start_time, timestamp_format, tz),
            format_timestamp(entry.end_time, timestamp_format, tz),
            report::format_hours(entry.duration()),
        ]);
    }

    let mut output = String::new();
    push_table(&mut output, &rows);
    output
}

/// Formats report data as JSON.
pub fn format_report_json(data: &ReportData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

// ========== Public Interface ==========

/// Output shape of the report command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Grid,
    Json,
    Entries,
}

/// Runs the report command.
pub async fn run<S, C, W, Tz>(
    writer: &mut W,
    engine: &SyncEngine<S, C>,
    range: (NaiveDate, NaiveDate),
    format: ReportFormat,
    timestamp_format: &str,
    tz: &Tz,
) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let bounds = window(range.0, range.1, tz)?;
    let entries = engine.all_tracks(bounds.0, bounds.1).await?;
    tracing::debug!(count = entries.len(), "collected report entries");

    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
    let generated_at = Utc
        .timestamp_opt(engine.clock().now(), 0)
        .single()
        .unwrap_or_default();
    let data = build_report(entries, bounds, range, tz, timezone, generated_at);

    match format {
        ReportFormat::Grid => write!(writer, "{}", format_report(&data))?,
        ReportFormat::Json => writeln!(writer, "{}", format_report_json(&data)?)?,
        ReportFormat::Entries => {
            write!(writer, "{}", format_entries(&data, timestamp_format, tz))?;
        }
    }
    Ok(())
}
