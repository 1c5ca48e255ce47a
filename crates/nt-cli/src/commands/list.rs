//! List command for every tracker block in the vault.

use std::io::Write;

use anyhow::Result;
use nt_core::Clock;
use nt_core::report::to_label;
use nt_vault::{DocumentStore, SyncEngine};

use super::util::format_duration;

pub async fn run<S, C, W>(writer: &mut W, engine: &SyncEngine<S, C>) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
{
    let sections = engine.discover_all().await?;
    if sections.is_empty() {
        writeln!(writer, "No tracker blocks found.")?;
        return Ok(());
    }

    for section in sections {
        let tracker = &section.tracker;
        let state = if section.defaulted && !section.payload.is_empty() {
            "unreadable"
        } else if tracker.is_running() {
            "running"
        } else {
            "stopped"
        };
        writeln!(
            writer,
            "{}:{}  {:<10}  {:<20}  {} entries  {}",
            section.document,
            section.index + 1,
            state,
            to_label(tracker.project.as_deref(), tracker.client.as_deref()),
            tracker.entries.roots().len(),
            format_duration(tracker.total_duration(engine.clock()))
        )?;
    }

    Ok(())
}
