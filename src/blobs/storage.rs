//! Local directory blob storage.
//!
//! Every blob is a UTF-8 file `<id>.json` in one flat directory. Standalone
//! documents (backups) are written under their own file name next to them.

use crate::blobs::BlobBackend;
use crate::error::{Result, StoreError};
use crate::index::INDEX_FILE_NAME;
use crate::types::{BlobId, BlobRequest, DeleteOutcome, StorageUsage};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Extension of blob files.
const BLOB_EXTENSION: &str = "json";

/// Number of hash bytes used for a generated blob id.
const BLOB_ID_BYTES: usize = 6;

/// Blob storage backed by a local directory.
pub struct LocalBlobStorage {
    /// Directory holding blobs, the index file, and backups.
    path: PathBuf,

    /// Mixed into id generation so ids differ within one clock tick.
    counter: AtomicU64,
}

impl LocalBlobStorage {
    /// Open the storage directory, creating it if absent.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        Ok(Self {
            path,
            counter: AtomicU64::new(0),
        })
    }

    /// The storage directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a blob exists.
    pub fn exists(&self, id: &BlobId) -> bool {
        self.blob_path(id).map(|p| p.exists()).unwrap_or(false)
    }

    /// List all blob ids. Documents with non-id file names are skipped.
    pub fn list(&self) -> Result<Vec<BlobId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_blob_stem(stem) {
                    ids.push(BlobId::from(stem));
                }
            }
        }

        Ok(ids)
    }

    /// Full path for a blob, or `None` if the id could escape the directory.
    fn blob_path(&self, id: &BlobId) -> Option<PathBuf> {
        if is_valid_id(id.as_str()) {
            Some(self.path.join(format!("{}.{}", id, BLOB_EXTENSION)))
        } else {
            None
        }
    }

    fn generate_id(&self, content: &str) -> BlobId {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        loop {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);

            let mut hasher = Sha256::new();
            hasher.update(nanos.to_le_bytes());
            hasher.update(n.to_le_bytes());
            hasher.update(content.as_bytes());
            let digest = hasher.finalize();

            let id = BlobId(hex::encode(&digest[..BLOB_ID_BYTES]));
            if !self.exists(&id) {
                return id;
            }
        }
    }

    fn write_file(path: &Path, content: &str) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl BlobBackend for LocalBlobStorage {
    fn name(&self) -> &str {
        "local"
    }

    fn endpoint(&self) -> String {
        self.path.display().to_string()
    }

    fn create_blob(&self, request: &BlobRequest<'_>) -> Result<BlobId> {
        let id = self.generate_id(request.content);
        let path = self
            .blob_path(&id)
            .ok_or_else(|| StoreError::BlobNotFound(id.clone()))?;

        Self::write_file(&path, request.content)?;
        debug!(path = %path.display(), "wrote blob");

        Ok(id)
    }

    fn fetch_blob(&self, id: &BlobId) -> Result<String> {
        let path = self
            .blob_path(id)
            .filter(|p| p.exists())
            .ok_or_else(|| StoreError::BlobNotFound(id.clone()))?;

        Ok(fs::read_to_string(path)?)
    }

    fn delete_blob(&self, id: &BlobId) -> Result<DeleteOutcome> {
        match self.blob_path(id) {
            Some(path) if path.exists() => {
                fs::remove_file(&path)?;
                Ok(DeleteOutcome::Deleted)
            }
            _ => Ok(DeleteOutcome::NotFound),
        }
    }

    fn write_document(&self, request: &BlobRequest<'_>) -> Result<String> {
        let file_name = Path::new(request.name)
            .file_name()
            .filter(|name| name.to_str() == Some(request.name))
            .ok_or_else(|| {
                StoreError::InvalidData(format!("not a plain file name: {}", request.name))
            })?;

        if is_reserved_name(request.name) {
            return Err(StoreError::InvalidData(format!(
                "file name is reserved for store data: {}",
                request.name
            )));
        }

        let path = self.path.join(file_name);
        Self::write_file(&path, request.content)?;
        debug!(path = %path.display(), "wrote document");

        Ok(path.display().to_string())
    }

    fn read_document(&self, id: &str) -> Result<String> {
        let path = fs::canonicalize(id)?;
        if !path.starts_with(fs::canonicalize(&self.path)?) {
            return Err(StoreError::InvalidData(format!(
                "document is outside the storage directory: {id}"
            )));
        }

        Ok(fs::read_to_string(path)?)
    }

    fn usage(&self) -> Result<Option<StorageUsage>> {
        let mut total_files = 0;
        let mut total_size_bytes = 0u64;

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(BLOB_EXTENSION) {
                total_files += 1;
            }
            total_size_bytes += entry.metadata()?.len();
        }

        Ok(Some(StorageUsage {
            directory: fs::canonicalize(&self.path)?,
            total_files,
            total_size_bytes,
        }))
    }
}

/// File stems that `list` treats as generated blob ids.
fn is_blob_stem(stem: &str) -> bool {
    stem.len() == BLOB_ID_BYTES * 2 && is_valid_id(stem)
}

/// Names a standalone document must not take: the index file and
/// anything shaped like a blob file.
fn is_reserved_name(name: &str) -> bool {
    if name == INDEX_FILE_NAME {
        return true;
    }
    let path = Path::new(name);
    path.extension().and_then(|e| e.to_str()) == Some(BLOB_EXTENSION)
        && path.file_stem().and_then(|s| s.to_str()).is_some_and(is_blob_stem)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> LocalBlobStorage {
        LocalBlobStorage::new(dir.path().join("blobs")).unwrap()
    }

    #[test]
    fn test_store_and_retrieve() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let id = storage
            .create_blob(&BlobRequest::json("a.json", r#"{"hello": "world"}"#))
            .unwrap();

        assert_eq!(id.as_str().len(), BLOB_ID_BYTES * 2);
        assert_eq!(storage.fetch_blob(&id).unwrap(), r#"{"hello": "world"}"#);
    }

    #[test]
    fn test_same_content_gets_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let id1 = storage.create_blob(&BlobRequest::json("a", "same")).unwrap();
        let id2 = storage.create_blob(&BlobRequest::json("a", "same")).unwrap();

        assert_ne!(id1, id2);
        assert_eq!(storage.list().unwrap().len(), 2);
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let id = storage.create_blob(&BlobRequest::json("a", "gone")).unwrap();

        assert!(storage.exists(&id));
        assert_eq!(storage.delete_blob(&id).unwrap(), DeleteOutcome::Deleted);
        assert!(!storage.exists(&id));
        assert_eq!(storage.delete_blob(&id).unwrap(), DeleteOutcome::NotFound);
        assert!(matches!(
            storage.fetch_blob(&id),
            Err(StoreError::BlobNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        fs::write(dir.path().join("secret.json"), "{}").unwrap();

        let escaping = BlobId::from("../secret");
        assert!(matches!(
            storage.fetch_blob(&escaping),
            Err(StoreError::BlobNotFound(_))
        ));
        assert_eq!(storage.delete_blob(&escaping).unwrap(), DeleteOutcome::NotFound);
        assert!(dir.path().join("secret.json").exists());
    }

    #[test]
    fn test_documents() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let path = storage
            .write_document(&BlobRequest::json("backup.json", "{}"))
            .unwrap();
        assert!(path.ends_with("backup.json"));
        assert_eq!(storage.read_document(&path).unwrap(), "{}");

        // Documents are not blobs
        assert!(storage.list().unwrap().is_empty());

        let nested = storage.write_document(&BlobRequest::json("../out.json", "{}"));
        assert!(matches!(nested, Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_documents_cannot_replace_store_files() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let id = storage.create_blob(&BlobRequest::json("a", "live")).unwrap();
        let blob_name = format!("{}.json", id);

        for name in [INDEX_FILE_NAME, blob_name.as_str(), "0123456789ab.json"] {
            let result = storage.write_document(&BlobRequest::json(name, "{}"));
            assert!(matches!(result, Err(StoreError::InvalidData(_))), "{name}");
        }
        assert_eq!(storage.fetch_blob(&id).unwrap(), "live");
        assert!(!storage.path().join(INDEX_FILE_NAME).exists());

        // Ordinary names stay allowed
        storage
            .write_document(&BlobRequest::json("nightly-0123456789ab.json", "{}"))
            .unwrap();
    }

    #[test]
    fn test_read_document_stays_inside_directory() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let outside = dir.path().join("outside.json");
        fs::write(&outside, "{}").unwrap();

        let result = storage.read_document(&outside.display().to_string());
        assert!(matches!(result, Err(StoreError::InvalidData(_))));

        let escaping = storage.path().join("..").join("outside.json");
        let result = storage.read_document(&escaping.display().to_string());
        assert!(matches!(result, Err(StoreError::InvalidData(_))));

        assert!(storage.read_document("/definitely/not/here.json").is_err());
    }

    #[test]
    fn test_usage() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        storage.create_blob(&BlobRequest::json("a", "12345")).unwrap();
        storage.create_blob(&BlobRequest::json("b", "678")).unwrap();
        fs::write(storage.path().join("notes.txt"), "xy").unwrap();

        let usage = storage.usage().unwrap().unwrap();
        assert_eq!(usage.total_files, 2);
        assert_eq!(usage.total_size_bytes, 10);
        assert!(usage.directory.is_absolute());
    }
}
