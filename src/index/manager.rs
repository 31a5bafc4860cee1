//! Index manager implementation.

use crate::blobs::{discard_blob, BlobBackend};
use crate::error::{Result, StoreError};
use crate::types::{BlobId, BlobRequest, Index, IndexEntry};
use parking_lot::RwLock;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Filename hint for index blobs.
pub const INDEX_BLOB_NAME: &str = "database_index.json";

/// Index file name inside a local storage directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Where the index is persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexLocation {
    /// A blob on the backend. `None` until the first save.
    Blob(Option<BlobId>),
    /// A file on local disk.
    File(PathBuf),
}

/// Owns the key index and its persistence.
///
/// Starts unloaded. The first access loads the persisted index; a missing,
/// unreadable, or unparsable index is treated as empty. Keys written before
/// such a failure become unreachable from this instance even though their
/// blobs still exist.
pub struct IndexManager {
    location: RwLock<IndexLocation>,

    /// `None` while unloaded.
    entries: RwLock<Option<Index>>,
}

impl IndexManager {
    pub fn new(location: IndexLocation) -> Self {
        Self {
            location: RwLock::new(location),
            entries: RwLock::new(None),
        }
    }

    /// Index kept as a blob, optionally re-attaching to an existing one.
    pub fn remote(index_id: Option<BlobId>) -> Self {
        Self::new(IndexLocation::Blob(index_id))
    }

    /// Index kept as a file.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(IndexLocation::File(path.as_ref().to_path_buf()))
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.read().is_some()
    }

    pub fn location(&self) -> IndexLocation {
        self.location.read().clone()
    }

    /// Current index blob id or file path.
    pub fn identifier(&self) -> Option<String> {
        match &*self.location.read() {
            IndexLocation::Blob(id) => id.as_ref().map(|id| id.to_string()),
            IndexLocation::File(path) => Some(path.display().to_string()),
        }
    }

    /// Load the persisted index unless already loaded.
    pub fn ensure_loaded(&self, backend: &dyn BlobBackend) {
        if self.entries.read().is_some() {
            return;
        }

        let mut entries = self.entries.write();
        if entries.is_none() {
            *entries = Some(self.load(backend));
        }
    }

    pub fn get(&self, backend: &dyn BlobBackend, key: &str) -> Option<IndexEntry> {
        self.with_index(backend, |index| index.get(key).cloned())
    }

    pub fn contains(&self, backend: &dyn BlobBackend, key: &str) -> bool {
        self.with_index(backend, |index| index.contains_key(key))
    }

    pub fn keys(&self, backend: &dyn BlobBackend) -> Vec<String> {
        self.with_index(backend, |index| index.keys().cloned().collect())
    }

    pub fn len(&self, backend: &dyn BlobBackend) -> usize {
        self.with_index(backend, |index| index.len())
    }

    /// A copy of the whole index.
    pub fn snapshot(&self, backend: &dyn BlobBackend) -> Index {
        self.with_index(backend, Index::clone)
    }

    /// Apply `mutate` and persist the result.
    ///
    /// The mutation runs on a copy, which replaces the in-memory index only
    /// once it has been saved. A failed save leaves memory matching the last
    /// persisted index.
    pub fn commit<T>(
        &self,
        backend: &dyn BlobBackend,
        mutate: impl FnOnce(&mut Index) -> T,
    ) -> Result<T> {
        self.ensure_loaded(backend);

        let mut entries = self.entries.write();
        let mut next = entries.clone().unwrap_or_default();
        let output = mutate(&mut next);

        self.save(backend, &next)?;
        *entries = Some(next);

        Ok(output)
    }

    fn with_index<R>(&self, backend: &dyn BlobBackend, f: impl FnOnce(&Index) -> R) -> R {
        self.ensure_loaded(backend);
        let entries = self.entries.read();
        f(entries.as_ref().unwrap_or(&Index::new()))
    }

    fn load(&self, backend: &dyn BlobBackend) -> Index {
        let content = match &*self.location.read() {
            IndexLocation::Blob(None) => return Index::new(),
            IndexLocation::Blob(Some(id)) => backend.fetch_blob(id),
            IndexLocation::File(path) if !path.exists() => return Index::new(),
            IndexLocation::File(path) => fs::read_to_string(path).map_err(StoreError::from),
        };

        let parsed = content
            .and_then(|content| serde_json::from_str::<Index>(&content).map_err(StoreError::from));

        match parsed {
            Ok(index) => {
                debug!(entries = index.len(), "loaded index");
                index
            }
            Err(e) => {
                warn!(error = %e, "could not load index, starting empty");
                Index::new()
            }
        }
    }

    fn save(&self, backend: &dyn BlobBackend, index: &Index) -> Result<()> {
        let content = serde_json::to_string_pretty(index)?;

        let mut location = self.location.write();
        match &mut *location {
            IndexLocation::File(path) => {
                let mut file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&*path)?;
                file.write_all(content.as_bytes())?;
                file.sync_all()?;
                debug!(path = %path.display(), entries = index.len(), "saved index");
            }
            IndexLocation::Blob(current) => {
                // No in-place update: write a new blob, then retire the old one.
                let new_id = backend.create_blob(&BlobRequest::json(INDEX_BLOB_NAME, &content))?;
                info!(index_id = %new_id, entries = index.len(), "saved index");

                if let Some(old_id) = current.replace(new_id) {
                    discard_blob(backend, &old_id, "previous index blob");
                }
            }
        }

        Ok(())
    }
}
