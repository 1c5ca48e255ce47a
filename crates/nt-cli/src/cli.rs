//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Time trackers kept inside markdown notes.
///
/// Finds `time-tracker` code blocks across a vault, starts and stops their
/// timers, and reports tracked hours per project and day.
#[derive(Debug, Parser)]
#[command(name = "nt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// A tracker block inside a note.
#[derive(Debug, Clone, Args)]
pub struct BlockRef {
    /// Note path relative to the vault root.
    pub document: String,

    /// Which tracker block in the note, counting from 1.
    #[arg(short, long, default_value_t = 1)]
    pub block: usize,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List every tracker block in the vault.
    List,

    /// Show the running timer, if any.
    Status,

    /// Print a tracker's entries as a markdown table or CSV.
    Show {
        #[command(flatten)]
        target: BlockRef,

        /// Output CSV instead of a markdown table.
        #[arg(long)]
        csv: bool,
    },

    /// Append an empty tracker block to a note.
    New {
        /// Note path relative to the vault root.
        document: String,
    },

    /// Start a new entry.
    Start {
        #[command(flatten)]
        target: BlockRef,

        /// Entry name (defaults to the tracker's last task name).
        #[arg(long)]
        name: Option<String>,

        /// Project (defaults to the tracker's last project).
        #[arg(long)]
        project: Option<String>,

        /// Client (defaults to the tracker's last client).
        #[arg(long)]
        client: Option<String>,

        /// Stop every other running timer in the vault first.
        #[arg(long)]
        stop_others: bool,
    },

    /// Stop the running entry of a tracker.
    Stop {
        #[command(flatten)]
        target: BlockRef,
    },

    /// Continue a stopped entry as a new part.
    Continue {
        #[command(flatten)]
        target: BlockRef,

        /// Entry position, e.g. `2` or `2.1`.
        entry: String,

        /// Name of the new part.
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove an entry.
    Remove {
        #[command(flatten)]
        target: BlockRef,

        /// Entry position, e.g. `2` or `2.1`.
        entry: String,
    },

    /// Rename an entry.
    Rename {
        #[command(flatten)]
        target: BlockRef,

        /// Entry position, e.g. `2` or `2.1`.
        entry: String,

        /// New name.
        name: String,
    },

    /// Stop every running timer in the vault.
    StopAll,

    /// Report tracked hours per project and day.
    Report {
        /// First day (YYYY-MM-DD, today, yesterday, or "N days ago").
        #[arg(long)]
        from: String,

        /// Last day, inclusive (defaults to --from).
        #[arg(long)]
        to: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// List individual entries instead of the day grid.
        #[arg(long)]
        entries: bool,
    },
}
