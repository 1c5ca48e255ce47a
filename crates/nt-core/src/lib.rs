//! Core domain logic for note-embedded time trackers.
//!
//! This crate contains the fundamental types and logic for:
//! - Entry trees: starting, stopping, splitting and merging timed entries
//! - Fenced blocks: finding tracker payloads in note text and round-tripping them
//! - Reports: clipping entries to a window and bucketing them by project and day
//!
//! Nothing here performs I/O; see `nt-vault` for document access.

pub mod clock;
pub mod entry;
pub mod fence;
pub mod report;
pub mod tracker;
mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entry::{Entry, EntryForest, EntryId, EntryRecord, TrackerError};
pub use fence::{Block, Decoded, FenceMarkers, decode_tracker, encode_tracker, locate_blocks};
pub use report::{Day, ReportEntry};
pub use tracker::{DisplayMode, Tracker};
pub use types::{DocumentId, ValidationError};
