//! Storage and synchronization for note-embedded time trackers.
//!
//! Documents are plain text read and rewritten whole through a
//! [`DocumentStore`]. The [`SyncEngine`] finds tracker blocks in every
//! document, edits them in place and stops running timers across the store.
//!
//! # Consistency
//!
//! There is no locking and no transaction. A store write replaces one whole
//! document; the only guard against concurrent edits is the closing-fence
//! check described on [`SyncEngine::stop_all`].

mod store;
mod sync;
mod vault;

pub use store::{DocumentStore, InMemoryStore, StoreError};
pub use sync::{FileSection, StopReport, SyncEngine, SyncError};
pub use vault::VaultStore;
