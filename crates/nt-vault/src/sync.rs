//! Block discovery and synchronization across a document store.
//!
//! # Concurrency
//!
//! There are no locks. Every write is a read-modify-write of one whole
//! document, and [`SyncEngine::stop_all`] protects its writes only by checking
//! that the closing fence is still where discovery saw it. Two concurrent
//! `stop_all` calls may both pick the same running block; whichever writes
//! second either fails the fence check and rescans, or rewrites an already
//! stopped block with an equivalent payload. Neither call is serialized
//! against the other or against single-block edits.
//!
//! `stop_all` has no timeout: a document that is rewritten between every
//! discovery and write keeps it rescanning.

use std::ops::Range;

use nt_core::fence::{self, FenceMarkers};
use nt_core::report::{self, ReportEntry};
use nt_core::{Clock, DocumentId, Tracker, TrackerError};
use thiserror::Error;

use crate::store::{DocumentStore, StoreError};

/// Synchronization errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A tracker mutation was rejected.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// The document has fewer tracker blocks than requested.
    #[error("{document} has no tracker block #{index}")]
    BlockNotFound { document: DocumentId, index: usize },

    /// The block has a payload that does not decode. Writing would replace
    /// it with a fresh tracker and lose whatever the payload held.
    #[error("{document} tracker block #{index} is unreadable; fix it by hand before editing")]
    Unreadable { document: DocumentId, index: usize },

    /// The tracker could not be serialized.
    #[error("failed to encode tracker: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A tracker block found during one scan.
///
/// The payload range is only valid against the document text of that scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSection {
    pub document: DocumentId,
    /// Position of the block among the document's blocks, from 0.
    pub index: usize,
    pub payload: Range<usize>,
    pub tracker: Tracker,
    /// True if the payload did not decode and `tracker` is a default.
    pub defaulted: bool,
}

/// Outcome of [`SyncEngine::stop_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Documents written, one entry per stopped timer.
    pub stopped: Vec<DocumentId>,
    /// Writes abandoned because the document changed after discovery.
    pub stale_rescans: usize,
}

/// Discovery, mutation and write-back of tracker blocks.
pub struct SyncEngine<S, C> {
    store: S,
    clock: C,
    markers: FenceMarkers,
}

impl<S: DocumentStore, C: Clock> SyncEngine<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            markers: FenceMarkers::default(),
        }
    }

    #[must_use]
    pub fn with_markers(mut self, markers: FenceMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn markers(&self) -> &FenceMarkers {
        &self.markers
    }

    /// Scans every document and returns all tracker blocks, documents in
    /// store order and blocks in text order.
    pub async fn discover_all(&self) -> Result<Vec<FileSection>, SyncError> {
        let documents = self.store.list_documents().await?;
        let mut sections = Vec::new();

        for document in documents {
            let text = self.store.read_text(&document).await?;
            for (index, block) in fence::locate_blocks(&text, &self.markers)
                .into_iter()
                .enumerate()
            {
                if block.defaulted && !text[block.payload.clone()].trim().is_empty() {
                    tracing::warn!(%document, index, "tracker payload unreadable, treating as empty");
                }
                sections.push(FileSection {
                    document: document.clone(),
                    index,
                    payload: block.payload,
                    tracker: block.tracker,
                    defaulted: block.defaulted,
                });
            }
        }

        tracing::debug!(count = sections.len(), "discovered tracker blocks");
        Ok(sections)
    }

    /// The first block, in discovery order, with a running entry.
    pub async fn find_first_running(&self) -> Result<Option<FileSection>, SyncError> {
        let sections = self.discover_all().await?;
        Ok(sections
            .into_iter()
            .find(|section| section.tracker.is_running()))
    }

    /// Stops every running entry in the store, one block per scan.
    ///
    /// On return, the last scan found nothing running. A block whose closing
    /// fence moved since discovery is left untouched and the whole store is
    /// rescanned.
    pub async fn stop_all(&self) -> Result<StopReport, SyncError> {
        let mut report = StopReport::default();

        loop {
            let sections = self.discover_all().await?;
            let Some(section) = sections
                .into_iter()
                .find(|section| section.tracker.is_running())
            else {
                tracing::debug!(stopped = report.stopped.len(), "no running timers left");
                return Ok(report);
            };

            let text = self.store.read_text(&section.document).await?;
            let mut tracker = section.tracker;
            tracker.end_running_entry(&self.clock)?;
            let payload = fence::encode_tracker(&tracker)?;

            let updated = fence::closer_at(&text, section.payload.end, &self.markers)
                .then(|| fence::splice(&text, section.payload.clone(), &payload))
                .flatten();
            let Some(updated) = updated else {
                tracing::warn!(
                    document = %section.document,
                    index = section.index,
                    "document changed since discovery, rescanning"
                );
                report.stale_rescans += 1;
                continue;
            };

            self.store.write_text(&section.document, &updated).await?;
            tracing::debug!(document = %section.document, index = section.index, "stopped timer");
            report.stopped.push(section.document);
        }
    }

    /// Decodes block `index` of `document` without writing anything.
    pub async fn read_block(
        &self,
        document: &DocumentId,
        index: usize,
    ) -> Result<Tracker, SyncError> {
        let text = self.store.read_text(document).await?;
        fence::locate_blocks(&text, &self.markers)
            .into_iter()
            .nth(index)
            .map(|block| block.tracker)
            .ok_or_else(|| SyncError::BlockNotFound {
                document: document.clone(),
                index,
            })
    }

    /// Applies `mutate` to block `index` of `document` and writes it back.
    ///
    /// The block is located in freshly read text, so the splice offsets are
    /// current. If `mutate` fails nothing is written. A block whose non-empty
    /// payload does not decode is refused with [`SyncError::Unreadable`].
    pub async fn modify_block<T>(
        &self,
        document: &DocumentId,
        index: usize,
        mutate: impl FnOnce(&mut Tracker, &dyn Clock) -> Result<T, TrackerError> + Send,
    ) -> Result<T, SyncError> {
        let text = self.store.read_text(document).await?;
        let block = fence::locate_blocks(&text, &self.markers)
            .into_iter()
            .nth(index)
            .ok_or_else(|| SyncError::BlockNotFound {
                document: document.clone(),
                index,
            })?;
        if block.defaulted && !text[block.payload.clone()].trim().is_empty() {
            tracing::warn!(%document, index, "refusing to overwrite unreadable tracker block");
            return Err(SyncError::Unreadable {
                document: document.clone(),
                index,
            });
        }

        let mut tracker = block.tracker;
        let result = mutate(&mut tracker, &self.clock)?;

        let payload = fence::encode_tracker(&tracker)?;
        let updated = fence::splice(&text, block.payload, &payload).ok_or_else(|| {
            SyncError::BlockNotFound {
                document: document.clone(),
                index,
            }
        })?;
        self.store.write_text(document, &updated).await?;
        tracing::debug!(%document, index, "updated tracker block");
        Ok(result)
    }

    /// Appends an empty tracker block, creating the document if needed.
    /// Returns the new block's index.
    pub async fn append_block(&self, document: &DocumentId) -> Result<usize, SyncError> {
        let mut text = match self.store.read_text(document).await {
            Ok(text) => text,
            Err(StoreError::NotFound(_)) => String::new(),
            Err(err) => return Err(err.into()),
        };
        let index = fence::locate_blocks(&text, &self.markers).len();

        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.markers.empty_block());
        self.store.write_text(document, &text).await?;
        Ok(index)
    }

    /// Every leaf in the store overlapping `[window_start, window_end]`,
    /// clipped to the window.
    pub async fn all_tracks(
        &self,
        window_start: i64,
        window_end: i64,
    ) -> Result<Vec<ReportEntry>, SyncError> {
        let sections = self.discover_all().await?;
        Ok(report::collect_tracks(
            sections.iter().map(|section| &section.tracker),
            window_start,
            window_end,
            self.clock.now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use nt_core::FixedClock;

    use super::*;
    use crate::store::InMemoryStore;

    const RUNNING: &str = r#"{"dispType":"default","project":"site","entries":[{"name":"a","startTime":100,"endTime":null,"subEntries":null}]}"#;
    const STOPPED: &str = r#"{"dispType":"default","entries":[{"name":"b","startTime":100,"endTime":200,"subEntries":null}]}"#;

    fn doc(id: &str) -> DocumentId {
        DocumentId::new(id).expect("valid id")
    }

    fn block(payload: &str) -> String {
        format!("```time-tracker\n{payload}\n```\n")
    }

    fn engine(store: InMemoryStore, now: i64) -> SyncEngine<InMemoryStore, FixedClock> {
        SyncEngine::new(store, FixedClock::new(now))
    }

    async fn running_count<S: DocumentStore, C: Clock>(engine: &SyncEngine<S, C>) -> usize {
        engine
            .discover_all()
            .await
            .expect("discover")
            .iter()
            .filter(|s| s.tracker.is_running())
            .count()
    }

    #[tokio::test]
    async fn discover_all_spans_documents_in_order() {
        let store = InMemoryStore::new()
            .with_document(doc("b.md"), format!("# B\n{}", block(STOPPED)))
            .with_document(doc("a.md"), format!("{}{}", block(RUNNING), block(STOPPED)))
            .with_document(doc("c.md"), "no blocks here");
        let engine = engine(store, 500);

        let sections = engine.discover_all().await.expect("discover");

        let found: Vec<(&str, usize)> = sections
            .iter()
            .map(|s| (s.document.as_str(), s.index))
            .collect();
        assert_eq!(found, vec![("a.md", 0), ("a.md", 1), ("b.md", 0)]);
        assert!(sections[0].tracker.is_running());
    }

    #[tokio::test]
    async fn stop_all_writes_only_running_document() {
        let store = InMemoryStore::new()
            .with_document(doc("doc1.md"), format!("intro\n{}", block(RUNNING)))
            .with_document(doc("doc2.md"), block(STOPPED));
        let engine = engine(store, 160);

        let report = engine.stop_all().await.expect("stop all");

        assert_eq!(report.stopped, vec![doc("doc1.md")]);
        assert_eq!(engine.store().writes(), vec![doc("doc1.md")]);
        assert_eq!(running_count(&engine).await, 0);

        let text = engine.store().text(&doc("doc1.md")).expect("doc1");
        assert!(text.starts_with("intro\n```time-tracker\n"));
        assert!(text.contains(r#""endTime":160"#));
        assert!(text.ends_with("\n```\n"));
        assert_eq!(
            engine.store().text(&doc("doc2.md")).expect("doc2"),
            block(STOPPED)
        );
    }

    #[tokio::test]
    async fn stop_all_keeps_unknown_keys() {
        let payload = r#"{"dispType":"default","color":"red","entries":[{"name":"a","startTime":10,"tag":"x"}]}"#;
        let store = InMemoryStore::new().with_document(doc("a.md"), block(payload));
        let engine = engine(store, 20);

        let report = engine.stop_all().await.expect("stop all");

        assert_eq!(report.stopped, vec![doc("a.md")]);
        assert_eq!(
            engine.store().text(&doc("a.md")).expect("a"),
            block(r#"{"dispType":"default","entries":[{"name":"a","startTime":10,"endTime":20,"subEntries":null,"tag":"x"}],"color":"red"}"#)
        );
    }

    #[tokio::test]
    async fn stop_all_handles_several_blocks_per_document() {
        let store = InMemoryStore::new()
            .with_document(doc("a.md"), format!("{}text\n{}", block(RUNNING), block(RUNNING)))
            .with_document(doc("b.md"), block(RUNNING));
        let engine = engine(store, 300);

        let report = engine.stop_all().await.expect("stop all");

        assert_eq!(report.stopped, vec![doc("a.md"), doc("a.md"), doc("b.md")]);
        assert_eq!(report.stale_rescans, 0);
        assert_eq!(running_count(&engine).await, 0);
    }

    #[tokio::test]
    async fn stop_all_twice_writes_nothing_second_time() {
        let store = InMemoryStore::new().with_document(doc("a.md"), block(RUNNING));
        let engine = engine(store, 300);

        engine.stop_all().await.expect("first");
        let writes = engine.store().writes().len();
        let second = engine.stop_all().await.expect("second");

        assert!(second.stopped.is_empty());
        assert_eq!(engine.store().writes().len(), writes);
    }

    /// Prepends a heading to the document on one specific read, simulating an
    /// edit between discovery and write.
    struct EditingStore {
        inner: InMemoryStore,
        reads: AtomicUsize,
        edit_on_read: usize,
    }

    #[async_trait]
    impl DocumentStore for EditingStore {
        async fn list_documents(&self) -> Result<Vec<DocumentId>, StoreError> {
            self.inner.list_documents().await
        }

        async fn read_text(&self, id: &DocumentId) -> Result<String, StoreError> {
            let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if read == self.edit_on_read {
                let text = self.inner.text(id).unwrap_or_default();
                self.inner.insert(id.clone(), format!("# Edited heading\n{text}"));
            }
            self.inner.read_text(id).await
        }

        async fn write_text(&self, id: &DocumentId, text: &str) -> Result<(), StoreError> {
            self.inner.write_text(id, text).await
        }
    }

    #[tokio::test]
    async fn stop_all_rescans_when_document_changed() {
        let store = EditingStore {
            inner: InMemoryStore::new().with_document(doc("a.md"), block(RUNNING)),
            reads: AtomicUsize::new(0),
            // read 1 is discovery, read 2 is the re-read before writing
            edit_on_read: 2,
        };
        let engine = SyncEngine::new(store, FixedClock::new(400));

        let report = engine.stop_all().await.expect("stop all");

        assert_eq!(report.stale_rescans, 1);
        assert_eq!(report.stopped, vec![doc("a.md")]);
        assert_eq!(engine.store().inner.writes().len(), 1);

        let text = engine.store().inner.text(&doc("a.md")).expect("text");
        assert!(text.starts_with("# Edited heading\n```time-tracker\n"));
        assert!(text.contains(r#""endTime":400"#));
        assert_eq!(fence::locate_blocks(&text, engine.markers()).len(), 1);
    }

    #[tokio::test]
    async fn find_first_running_returns_first_match() {
        let store = InMemoryStore::new()
            .with_document(doc("a.md"), block(STOPPED))
            .with_document(doc("b.md"), format!("{}{}", block(STOPPED), block(RUNNING)));
        let engine = engine(store, 500);

        let section = engine
            .find_first_running()
            .await
            .expect("find")
            .expect("running section");
        assert_eq!(section.document, doc("b.md"));
        assert_eq!(section.index, 1);

        engine.stop_all().await.expect("stop");
        assert!(engine.find_first_running().await.expect("find").is_none());
    }

    #[tokio::test]
    async fn modify_block_starts_entry_in_empty_block() {
        let store = InMemoryStore::new().with_document(doc("a.md"), "# Day\n```time-tracker\n```\n");
        let engine = engine(store, 1_000);

        engine
            .modify_block(&doc("a.md"), 0, |tracker, clock| {
                Ok(tracker.start_new_entry("write", Some("book"), None, clock))
            })
            .await
            .expect("start");

        let sections = engine.discover_all().await.expect("discover");
        assert_eq!(sections.len(), 1);
        assert!(sections[0].tracker.is_running());
        assert_eq!(sections[0].tracker.project.as_deref(), Some("book"));
        assert!(!sections[0].defaulted);
    }

    #[tokio::test]
    async fn modify_block_failure_writes_nothing() {
        let store = InMemoryStore::new().with_document(doc("a.md"), block(STOPPED));
        let engine = engine(store, 1_000);

        let err = engine
            .modify_block(&doc("a.md"), 0, |tracker, clock| {
                tracker.end_running_entry(clock)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Tracker(TrackerError::NoRunningEntry)));
        assert!(engine.store().writes().is_empty());
    }

    #[tokio::test]
    async fn modify_block_refuses_unreadable_payload() {
        let payload = r#"{"entries":[{"name":null,"startTime":10,"endTime":20}]}"#;
        let store = InMemoryStore::new().with_document(doc("a.md"), block(payload));
        let engine = engine(store, 1_000);

        let err = engine
            .modify_block(&doc("a.md"), 0, |tracker, clock| {
                Ok(tracker.start_new_entry("n", None, None, clock))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Unreadable { index: 0, .. }));
        assert!(engine.store().writes().is_empty());
        assert_eq!(engine.store().text(&doc("a.md")).expect("a"), block(payload));
    }

    #[tokio::test]
    async fn modify_block_missing_index() {
        let store = InMemoryStore::new().with_document(doc("a.md"), block(STOPPED));
        let engine = engine(store, 1_000);

        let err = engine
            .modify_block(&doc("a.md"), 3, |_, _| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BlockNotFound { index: 3, .. }));
    }

    #[tokio::test]
    async fn read_block_picks_block_by_index() {
        let store = InMemoryStore::new()
            .with_document(doc("a.md"), format!("{}{}", block(STOPPED), block(RUNNING)));
        let engine = engine(store, 1_000);

        let tracker = engine.read_block(&doc("a.md"), 1).await.expect("read");
        assert!(tracker.is_running());
        assert_eq!(tracker.project.as_deref(), Some("site"));
        assert!(matches!(
            engine.read_block(&doc("a.md"), 2).await,
            Err(SyncError::BlockNotFound { index: 2, .. })
        ));
        assert!(engine.store().writes().is_empty());
    }

    #[tokio::test]
    async fn append_block_creates_and_extends_documents() {
        let store = InMemoryStore::new().with_document(doc("a.md"), "no newline");
        let engine = engine(store, 1_000);

        assert_eq!(engine.append_block(&doc("a.md")).await.expect("append"), 0);
        assert_eq!(engine.append_block(&doc("a.md")).await.expect("append"), 1);
        assert_eq!(engine.append_block(&doc("new.md")).await.expect("append"), 0);

        assert_eq!(
            engine.store().text(&doc("a.md")).expect("a"),
            "no newline\n```time-tracker\n```\n```time-tracker\n```\n"
        );
        assert_eq!(
            engine.store().text(&doc("new.md")).expect("new"),
            "```time-tracker\n```\n"
        );
    }

    #[tokio::test]
    async fn all_tracks_clips_and_labels() {
        let payload = r#"{"project":"p","client":"c","entries":[{"name":"x","startTime":500,"endTime":2500}]}"#;
        let store = InMemoryStore::new().with_document(doc("a.md"), block(payload));
        let engine = engine(store, 3_000);

        let records = engine.all_tracks(1000, 2000).await.expect("tracks");

        assert_eq!(
            records,
            vec![ReportEntry {
                label: "p/c".to_string(),
                start_time: 1000,
                end_time: 2000,
            }]
        );
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = InMemoryStore::new();
        let engine = engine(store, 0);
        let err = engine
            .modify_block(&doc("missing.md"), 0, |_, _| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::NotFound(_))));
    }
}
