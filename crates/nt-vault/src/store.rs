//! Document store abstraction.
//!
//! The sync engine only ever reads and writes whole documents. Implementations:
//! - [`InMemoryStore`] - for tests and embedding
//! - [`VaultStore`](crate::VaultStore) - markdown files below a directory

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use nt_core::DocumentId;
use thiserror::Error;

/// Document store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist.
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    /// The document id cannot be mapped to a location inside the store.
    #[error("invalid document path: {0}")]
    InvalidPath(DocumentId),

    /// An error from the underlying filesystem.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whole-document text storage.
///
/// `read_text` must reflect the latest committed write; `write_text`
/// replaces the whole document atomically.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in a stable order.
    async fn list_documents(&self) -> Result<Vec<DocumentId>, StoreError>;

    async fn read_text(&self, id: &DocumentId) -> Result<String, StoreError>;

    async fn write_text(&self, id: &DocumentId, text: &str) -> Result<(), StoreError>;
}

/// In-memory store that records every write.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<BTreeMap<DocumentId, String>>,
    writes: RwLock<Vec<DocumentId>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert that does not count as a write.
    #[must_use]
    pub fn with_document(self, id: DocumentId, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    /// Sets a document's text without recording a write.
    pub fn insert(&self, id: DocumentId, text: impl Into<String>) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, text.into());
    }

    /// Current text of a document.
    pub fn text(&self, id: &DocumentId) -> Option<String> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Documents written through [`DocumentStore::write_text`], in order.
    pub fn writes(&self) -> Vec<DocumentId> {
        self.writes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn list_documents(&self) -> Result<Vec<DocumentId>, StoreError> {
        Ok(self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    async fn read_text(&self, id: &DocumentId) -> Result<String, StoreError> {
        self.text(id).ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn write_text(&self, id: &DocumentId, text: &str) -> Result<(), StoreError> {
        self.insert(id.clone(), text);
        self.writes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id.clone());
        Ok(())
    }
}
