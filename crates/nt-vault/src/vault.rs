//! Markdown vault on the local filesystem, using `tokio::fs`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use nt_core::DocumentId;
use tokio::fs;

use crate::store::{DocumentStore, StoreError};

const NOTE_EXTENSION: &str = "md";

/// Every `*.md` file below a root directory is a document.
///
/// Dot-directories (`.obsidian`, `.trash`, `.git`) are skipped. Document ids
/// are root-relative paths with `/` separators.
#[derive(Debug, Clone)]
pub struct VaultStore {
    root: PathBuf,
}

impl VaultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, id: &DocumentId) -> Result<PathBuf, StoreError> {
        let relative = Path::new(id.as_str());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StoreError::InvalidPath(id.clone()));
        }
        Ok(self.root.join(relative))
    }

    fn relative_id(&self, path: &Path) -> Option<DocumentId> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        DocumentId::new(parts.join("/")).ok()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl DocumentStore for VaultStore {
    async fn list_documents(&self) -> Result<Vec<DocumentId>, StoreError> {
        let mut documents = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| io_error(&dir, e))?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&dir, e))? {
                let path = entry.path();
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if hidden {
                    continue;
                }
                let file_type = entry.file_type().await.map_err(|e| io_error(&path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == NOTE_EXTENSION) {
                    if let Some(id) = self.relative_id(&path) {
                        documents.push(id);
                    } else {
                        tracing::debug!(path = %path.display(), "skipping non-UTF-8 note path");
                    }
                }
            }
        }

        documents.sort();
        tracing::debug!(count = documents.len(), root = %self.root.display(), "listed vault documents");
        Ok(documents)
    }

    async fn read_text(&self, id: &DocumentId) -> Result<String, StoreError> {
        let path = self.full_path(id)?;
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.clone()))
            }
            Err(err) => Err(io_error(&path, err)),
        }
    }

    async fn write_text(&self, id: &DocumentId, text: &str) -> Result<(), StoreError> {
        let path = self.full_path(id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        // Write beside the target and rename over it so readers never see a
        // partially written note.
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| StoreError::InvalidPath(id.clone()))?;
        let temp = path.with_file_name(format!(".{file_name}.nt-tmp"));
        fs::write(&temp, text).await.map_err(|e| io_error(&temp, e))?;
        fs::rename(&temp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;
        Ok(())
    }
}
