//! Status command for showing the running timer.

use std::io::Write;

use anyhow::Result;
use chrono::TimeZone;
use nt_core::Clock;
use nt_core::report::to_label;
use nt_vault::{DocumentStore, SyncEngine};

use super::util::{format_duration, format_timestamp};
use crate::Config;

pub async fn run<S, C, W, Tz>(
    writer: &mut W,
    engine: &SyncEngine<S, C>,
    config: &Config,
    tz: &Tz,
) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(section) = engine.find_first_running().await? else {
        writeln!(writer, "No timer running.")?;
        return Ok(());
    };

    let tracker = &section.tracker;
    let Some(entry) = tracker
        .running_entry()
        .and_then(|id| tracker.entries.get(id))
    else {
        writeln!(writer, "No timer running.")?;
        return Ok(());
    };

    let now = engine.clock().now();
    let started = entry.start_time.unwrap_or(now);
    writeln!(
        writer,
        "Running: {} ({})",
        entry.name,
        to_label(tracker.project.as_deref(), tracker.client.as_deref())
    )?;
    writeln!(writer, "Note: {} block {}", section.document, section.index + 1)?;
    writeln!(
        writer,
        "Since: {} ({})",
        format_timestamp(started, &config.timestamp_format, tz),
        format_duration(now - started)
    )?;
    writeln!(
        writer,
        "Tracker total: {}",
        format_duration(tracker.total_duration(engine.clock()))
    )?;

    Ok(())
}
