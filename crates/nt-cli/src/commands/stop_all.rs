//! Stop-all command.

use std::io::Write;

use anyhow::Result;
use nt_core::Clock;
use nt_vault::{DocumentStore, SyncEngine};

pub async fn run<S, C, W>(writer: &mut W, engine: &SyncEngine<S, C>) -> Result<()>
where
    S: DocumentStore,
    C: Clock,
    W: Write,
{
    let report = engine.stop_all().await?;

    if report.stopped.is_empty() {
        writeln!(writer, "No timer running.")?;
        return Ok(());
    }
    for document in &report.stopped {
        writeln!(writer, "Stopped timer in {document}")?;
    }
    if report.stale_rescans > 0 {
        writeln!(
            writer,
            "Rescanned {} time(s) after notes changed during the stop.",
            report.stale_rescans
        )?;
    }
    Ok(())
}
