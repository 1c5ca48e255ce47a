//! Single-block commands: new, start, stop, continue, remove and rename.

use std::io::Write;

use anyhow::{Context, Result};
use nt_core::{Clock, DocumentId, EntryId, Tracker, TrackerError};
use nt_vault::{DocumentStore, SyncEngine};

use super::util::{format_duration, parse_entry_path, resolve_block};
use crate::cli::BlockRef;

/// Options for [`start`]. Absent fields fall back to the tracker's hints.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub name: Option<String>,
    pub project: Option<String>,
    pub client: Option<String>,
    pub stop_others: bool,
}

fn entry_name(tracker: &Tracker, id: EntryId) -> String {
    tracker
        .entries
        .get(id)
        .map(|entry| entry.name.clone())
        .unwrap_or_default()
}

/// Appends an empty tracker block to a note.
pub async fn new<S, C, W>(
    writer: &mut W,
    engine: &SyncEngine<S, C>,
    document: &str,
) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
{
    let document = DocumentId::new(document).context("document path is empty")?;
    let index = engine.append_block(&document).await?;
    writeln!(writer, "Added tracker block {} to {document}", index + 1)?;
    Ok(())
}

pub async fn start<S, C, W>(
    writer: &mut W,
    engine: &SyncEngine<S, C>,
    target: &BlockRef,
    options: StartOptions,
) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
{
    let (document, index) = resolve_block(target)?;

    if options.stop_others {
        let report = engine.stop_all().await?;
        for stopped in &report.stopped {
            writeln!(writer, "Stopped timer in {stopped}")?;
        }
    }

    let name = engine
        .modify_block(&document, index, move |tracker, clock| {
            if tracker.is_running() {
                return Err(TrackerError::AlreadyRunning);
            }
            let name = options
                .name
                .or_else(|| tracker.current_task.clone())
                .unwrap_or_default();
            let project = options.project.or_else(|| tracker.project.clone());
            let client = options.client.or_else(|| tracker.client.clone());
            let id = tracker.start_new_entry(&name, project.as_deref(), client.as_deref(), clock);
            Ok(entry_name(tracker, id))
        })
        .await?;

    writeln!(writer, "Started {name} in {document} block {}", index + 1)?;
    Ok(())
}

pub async fn stop<S, C, W>(
    writer: &mut W,
    engine: &SyncEngine<S, C>,
    target: &BlockRef,
) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
{
    let (document, index) = resolve_block(target)?;
    let (name, duration) = engine
        .modify_block(&document, index, |tracker, clock| {
            let id = tracker.end_running_entry(clock)?;
            Ok((
                entry_name(tracker, id),
                tracker.entries.duration(id, clock.now()),
            ))
        })
        .await?;

    writeln!(writer, "Stopped {name} after {}", format_duration(duration))?;
    Ok(())
}

/// Starts a new running part under an existing entry.
pub async fn continue_entry<S, C, W>(
    writer: &mut W,
    engine: &SyncEngine<S, C>,
    target: &BlockRef,
    entry: &str,
    name: Option<String>,
) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
{
    let (document, index) = resolve_block(target)?;
    let path = parse_entry_path(entry)?;

    let (parent, part) = engine
        .modify_block(&document, index, move |tracker, clock| {
            if tracker.is_running() {
                return Err(TrackerError::AlreadyRunning);
            }
            let id = tracker.entries.resolve(&path)?;
            let part = tracker.entries.start_sub_entry(
                id,
                name.as_deref().unwrap_or_default(),
                clock.now(),
            )?;
            Ok((entry_name(tracker, id), entry_name(tracker, part)))
        })
        .await?;

    writeln!(writer, "Continued {parent} as {part}")?;
    Ok(())
}

pub async fn remove<S, C, W>(
    writer: &mut W,
    engine: &SyncEngine<S, C>,
    target: &BlockRef,
    entry: &str,
) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
{
    let (document, index) = resolve_block(target)?;
    let path = parse_entry_path(entry)?;

    let name = engine
        .modify_block(&document, index, move |tracker, _| {
            let id = tracker.entries.resolve(&path)?;
            let name = entry_name(tracker, id);
            if !tracker.entries.remove(id) {
                return Err(TrackerError::UnknownEntry(id));
            }
            Ok(name)
        })
        .await?;

    writeln!(writer, "Removed {name}")?;
    Ok(())
}

pub async fn rename<S, C, W>(
    writer: &mut W,
    engine: &SyncEngine<S, C>,
    target: &BlockRef,
    entry: &str,
    name: &str,
) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
{
    let (document, index) = resolve_block(target)?;
    let path = parse_entry_path(entry)?;
    let new_name = name.to_string();

    let old_name = engine
        .modify_block(&document, index, move |tracker, _| {
            let id = tracker.entries.resolve(&path)?;
            let old_name = entry_name(tracker, id);
            tracker.entries.edit_entry(id, Some(&new_name), None)?;
            Ok(old_name)
        })
        .await?;

    writeln!(writer, "Renamed {old_name} to {name}")?;
    Ok(())
}
