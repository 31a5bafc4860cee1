//! Main Store struct tying the index and a blob backend together.

use crate::blobs::{discard_blob, BlobBackend, LocalBlobStorage};
use crate::error::{Result, StoreError};
use crate::index::{IndexManager, INDEX_FILE_NAME};
use crate::remote::{HttpSettings, ServiceKind};
use crate::selector::{BackendSelector, Selection};
use crate::types::{
    to_data, Backup, BlobId, BlobRequest, IndexEntry, Metadata, Record, StorageUsage, StoreInfo,
    Timestamp,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which backend a store persists to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendConfig {
    /// A single Paste (safone) instance. Supports delete.
    Paste { base_url: String },

    /// Probe the known paste services, preferred first, and use the first
    /// one that answers.
    Multi { preferred: ServiceKind },

    /// Files in a local directory.
    Offline { path: PathBuf },
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub backend: BackendConfig,

    /// Existing index blob to re-attach to. Ignored by offline stores,
    /// whose index lives at a fixed path.
    pub index_id: Option<BlobId>,

    /// Transport settings for remote backends.
    pub http: HttpSettings,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Paste {
                base_url: ServiceKind::Safone.default_url().to_string(),
            },
            index_id: None,
            http: HttpSettings::default(),
        }
    }
}

impl StoreConfig {
    /// Offline store rooted at `path`.
    pub fn offline(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig::Offline { path: path.into() },
            ..Default::default()
        }
    }
}

/// A key-value record store on top of a blob backend.
///
/// The backend only knows opaque blobs. The store keeps the key space in an
/// index and maintains these rules:
/// - a record blob is always written before the index refers to it;
/// - a replaced or deleted blob is only removed after the index stopped
///   referring to it, and that removal is best effort;
/// - keys absent from the index do not exist, whatever the backend holds.
///
/// Several processes sharing one remote index are not coordinated: each
/// save writes a whole new index blob and the last writer wins.
pub struct Store {
    backend: Box<dyn BlobBackend>,

    index: IndexManager,

    /// Recorded in index entries so a shared index shows where blobs live.
    service: Option<String>,

    /// Every backend this store was configured with.
    available_backends: Vec<String>,

    /// Serializes create/update/delete.
    write_lock: Mutex<()>,
}

impl Store {
    /// Open a store as described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        match config.backend {
            BackendConfig::Paste { base_url } => {
                let backend = ServiceKind::Safone.connect(&base_url, &config.http)?;
                Ok(Self::with_backend(backend, config.index_id))
            }
            BackendConfig::Multi { preferred } => {
                let mut selector =
                    BackendSelector::new(preferred.connect(preferred.default_url(), &config.http)?);
                for kind in ServiceKind::candidates(preferred).into_iter().skip(1) {
                    selector = selector.with_alternate(kind.connect(kind.default_url(), &config.http)?);
                }
                Ok(Self::from_selection(selector.select()?, config.index_id))
            }
            BackendConfig::Offline { path } => Self::offline(path),
        }
    }

    /// Store over any backend, with the index kept as a blob on it.
    pub fn with_backend(backend: Box<dyn BlobBackend>, index_id: Option<BlobId>) -> Self {
        let name = backend.name().to_string();
        Self::assemble(
            backend,
            IndexManager::remote(index_id),
            Some(name.clone()),
            vec![name],
        )
    }

    /// Store over the backend picked by a [`BackendSelector`].
    pub fn from_selection(selection: Selection, index_id: Option<BlobId>) -> Self {
        let name = selection.backend.name().to_string();
        Self::assemble(
            selection.backend,
            IndexManager::remote(index_id),
            Some(name),
            selection.candidates,
        )
    }

    /// Store persisting to files under `path`; the index is `path/index.json`.
    pub fn offline(path: impl AsRef<Path>) -> Result<Self> {
        let storage = LocalBlobStorage::new(path)?;
        let index = IndexManager::file(storage.path().join(INDEX_FILE_NAME));
        let name = storage.name().to_string();

        Ok(Self::assemble(Box::new(storage), index, None, vec![name]))
    }

    fn assemble(
        backend: Box<dyn BlobBackend>,
        index: IndexManager,
        service: Option<String>,
        available_backends: Vec<String>,
    ) -> Self {
        Self {
            backend,
            index,
            service,
            available_backends,
            write_lock: Mutex::new(()),
        }
    }

    // --- Record Operations ---

    /// Create a record under a new key, returning its blob id.
    ///
    /// `data` must serialize to a JSON object. Fails with
    /// [`StoreError::DuplicateKey`] if the key exists. If the upload fails
    /// the index is left untouched.
    pub fn create(
        &self,
        key: &str,
        data: &impl Serialize,
        metadata: Option<Metadata>,
    ) -> Result<BlobId> {
        let data = to_data(data)?;
        let _lock = self.write_lock.lock();

        if self.index.contains(self.blobs(), key) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }

        let now = Timestamp::now();
        let record = Record::new(data, metadata.unwrap_or_default(), now, now);
        let blob_id = self.put_record(key, &record)?;

        let entry = IndexEntry::for_record(blob_id.clone(), &record, self.service.clone());
        self.index.commit(self.blobs(), |index| {
            index.insert(key.to_string(), entry);
        })?;

        info!(key, blob_id = %blob_id, "created record");
        Ok(blob_id)
    }

    /// Read the record stored under `key`.
    ///
    /// Returns `None` when the key is unknown, and also when its blob cannot
    /// be fetched or parsed: a backend outage looks like a missing record.
    pub fn read(&self, key: &str) -> Option<Record> {
        let entry = self.index.get(self.blobs(), key)?;
        self.load_record(key, &entry)
    }

    /// Replace the data of an existing record.
    ///
    /// Returns `Ok(false)` if the key is unknown or its current record
    /// cannot be read. `metadata: None` keeps the current metadata. The
    /// creation time is kept and the update time never moves backwards.
    pub fn update(
        &self,
        key: &str,
        data: &impl Serialize,
        metadata: Option<Metadata>,
    ) -> Result<bool> {
        let data = to_data(data)?;
        let _lock = self.write_lock.lock();

        let Some(entry) = self.index.get(self.blobs(), key) else {
            return Ok(false);
        };
        let Some(current) = self.load_record(key, &entry) else {
            return Ok(false);
        };

        let updated_at = Timestamp::now().max(current.updated_at);
        let record = Record::new(
            data,
            metadata.unwrap_or(current.metadata),
            current.created_at,
            updated_at,
        );

        // New blob first: until the index is saved the old one stays valid.
        let blob_id = self.put_record(key, &record)?;

        let new_entry = IndexEntry::for_record(blob_id.clone(), &record, self.service.clone());
        self.index.commit(self.blobs(), |index| {
            index.insert(key.to_string(), new_entry);
        })?;

        discard_blob(self.blobs(), &entry.blob_id, "superseded record blob");

        info!(key, blob_id = %blob_id, "updated record");
        Ok(true)
    }

    /// Delete a record. Returns `Ok(false)` if the key is unknown.
    ///
    /// The blob itself is removed on a best-effort basis and may outlive the key.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let _lock = self.write_lock.lock();

        let Some(entry) = self.index.get(self.blobs(), key) else {
            return Ok(false);
        };

        self.index.commit(self.blobs(), |index| {
            index.remove(key);
        })?;

        discard_blob(self.blobs(), &entry.blob_id, "deleted record blob");

        info!(key, "deleted record");
        Ok(true)
    }

    /// All keys, in lexicographic order.
    pub fn list_keys(&self) -> Vec<String> {
        self.index.keys(self.blobs())
    }

    /// Keys whose record contains `query`, ignoring case.
    ///
    /// With `field`, only that field of the payload is searched. Every
    /// record is fetched from the backend on each call.
    pub fn search(&self, query: &str, field: Option<&str>) -> Vec<String> {
        self.index
            .snapshot(self.blobs())
            .iter()
            .filter_map(|(key, entry)| {
                let record = self.load_record(key, entry)?;
                record.matches(query, field).then(|| key.clone())
            })
            .collect()
    }

    /// Number of keys.
    pub fn count(&self) -> usize {
        self.index.len(self.blobs())
    }

    // --- Backups ---

    /// Write the index plus every readable record as one document.
    ///
    /// Records are fetched one after another, so the backup is not an
    /// atomic snapshot. Returns the backup's blob id, or its file path for
    /// offline stores.
    pub fn backup(&self, name: Option<&str>) -> Result<String> {
        let index = self.index.snapshot(self.blobs());

        let mut records = BTreeMap::new();
        for (key, entry) in &index {
            if let Some(record) = self.load_record(key, entry) {
                records.insert(key.clone(), record);
            }
        }

        let backup = Backup {
            service: Some(self.backend.name().to_string()),
            service_url: Some(self.backend.endpoint()),
            backup_time: Timestamp::now(),
            index,
            records,
        };

        let name = match name {
            Some(name) => name.to_string(),
            None => format!("database_backup_{}.json", backup.backup_time),
        };
        let content = serde_json::to_string_pretty(&backup)?;
        let id = self
            .backend
            .write_document(&BlobRequest::json(&name, &content))?;

        info!(backup = %id, records = backup.records.len(), "wrote backup");
        Ok(id)
    }

    /// Read a backup written by [`Store::backup`].
    pub fn read_backup(&self, id: &str) -> Result<Backup> {
        let content = self.backend.read_document(id)?;
        Ok(serde_json::from_str(&content)?)
    }

    // --- Diagnostics ---

    /// Current index blob id, or the index file path for offline stores.
    pub fn index_id(&self) -> Option<String> {
        self.index.identifier()
    }

    /// Disk footprint for offline stores.
    pub fn storage_usage(&self) -> Result<Option<StorageUsage>> {
        self.backend.usage()
    }

    pub fn get_info(&self) -> Result<StoreInfo> {
        Ok(StoreInfo {
            backend: self.backend.name().to_string(),
            endpoint: self.backend.endpoint(),
            record_count: self.count(),
            index_id: self.index_id(),
            available_backends: self.available_backends.clone(),
            storage: self.storage_usage()?,
        })
    }

    // --- Private Helpers ---

    fn blobs(&self) -> &dyn BlobBackend {
        &*self.backend
    }

    fn put_record(&self, key: &str, record: &Record) -> Result<BlobId> {
        let content = serde_json::to_string_pretty(record)?;
        let name = format!("{key}.json");

        let blob_id = self.backend.create_blob(&BlobRequest::json(&name, &content))?;
        debug!(key, blob_id = %blob_id, "wrote record blob");

        Ok(blob_id)
    }

    fn fetch_record(&self, entry: &IndexEntry) -> Result<Record> {
        let content = self.backend.fetch_blob(&entry.blob_id)?;
        let mut record: Record = serde_json::from_str(&content)?;
        record.id = entry.blob_id.clone();
        Ok(record)
    }

    fn load_record(&self, key: &str, entry: &IndexEntry) -> Option<Record> {
        match self.fetch_record(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key, blob_id = %entry.blob_id, error = %e, "could not read record");
                None
            }
        }
    }
}
