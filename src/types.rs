//! Core types for the record store.

use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque identifier assigned by a backend when a blob is created.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(pub String);

impl BlobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobId({})", self.0)
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlobId {
    fn from(s: String) -> Self {
        BlobId(s)
    }
}

impl From<&str> for BlobId {
    fn from(s: &str) -> Self {
        BlobId(s.to_string())
    }
}

/// Seconds since Unix epoch.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        Timestamp(secs)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Free-form string annotations attached to a record.
pub type Metadata = BTreeMap<String, String>;

/// Record payload: a JSON object of arbitrary nesting.
pub type Data = serde_json::Map<String, Value>;

/// Serialize `value` into record data. Only JSON objects are accepted.
pub fn to_data(value: &impl Serialize) -> Result<Data> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidData(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single record in the store.
///
/// This is also the persisted shape of a record blob. The `id` inside a
/// blob is empty because the backend only assigns it after the upload;
/// [`crate::Store::read`] fills it in from the index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: BlobId,

    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Data,

    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: Timestamp,

    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: Timestamp,

    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
}

impl Record {
    /// A record that has not been uploaded yet.
    pub fn new(data: Data, metadata: Metadata, created_at: Timestamp, updated_at: Timestamp) -> Self {
        Self {
            id: BlobId::default(),
            data,
            created_at,
            updated_at,
            metadata,
        }
    }

    /// Decode the payload into a typed value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }

    /// Case-insensitive substring match against one field or the whole payload.
    ///
    /// A field matches on its text for JSON strings and on its compact JSON
    /// form for everything else. Without a field, the compact JSON of the
    /// entire payload is searched, field names included.
    pub fn matches(&self, query: &str, field: Option<&str>) -> bool {
        let needle = query.to_lowercase();
        match field {
            Some(field) => match self.data.get(field) {
                Some(Value::String(text)) => text.to_lowercase().contains(&needle),
                Some(value) => value.to_string().to_lowercase().contains(&needle),
                None => false,
            },
            None => serde_json::to_string(&self.data)
                .map(|text| text.to_lowercase().contains(&needle))
                .unwrap_or(false),
        }
    }
}

/// Index entry for one logical key.
///
/// Timestamps and metadata mirror the live record so listing does not
/// need to fetch blobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(rename = "paste_id")]
    pub blob_id: BlobId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: Timestamp,

    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: Timestamp,

    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
}

impl IndexEntry {
    /// Entry pointing at `blob_id`, which holds `record`.
    pub fn for_record(blob_id: BlobId, record: &Record, service: Option<String>) -> Self {
        Self {
            blob_id,
            service,
            created_at: record.created_at,
            updated_at: record.updated_at,
            metadata: record.metadata.clone(),
        }
    }
}

/// Key to entry mapping. Ordered so the persisted form is canonical.
pub type Index = BTreeMap<String, IndexEntry>;

/// Persisted shape of a whole-store backup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Backup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,

    #[serde(default)]
    pub backup_time: Timestamp,

    pub index: Index,

    pub records: BTreeMap<String, Record>,
}

/// Content and hints for a blob upload.
#[derive(Clone, Copy, Debug)]
pub struct BlobRequest<'a> {
    pub content: &'a str,
    /// Filename hint; some services display it, the local adapter uses it
    /// for standalone documents.
    pub name: &'a str,
    pub language: &'a str,
    pub ephemeral: bool,
}

impl<'a> BlobRequest<'a> {
    /// A persistent JSON document.
    pub fn json(name: &'a str, content: &'a str) -> Self {
        Self {
            content,
            name,
            language: "json",
            ephemeral: false,
        }
    }
}

/// Result of an advisory blob delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// The backend has no delete operation.
    Unsupported,
}

/// Disk footprint of a local storage directory.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StorageUsage {
    pub directory: PathBuf,
    /// Number of `.json` files.
    pub total_files: usize,
    /// Size of every file in the directory.
    pub total_size_bytes: u64,
}

impl StorageUsage {
    /// Total size in megabytes, rounded to two decimals.
    pub fn total_size_mb(&self) -> f64 {
        (self.total_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

/// Diagnostic summary of a store.
#[derive(Clone, Debug, Serialize)]
pub struct StoreInfo {
    pub backend: String,
    pub endpoint: String,
    pub record_count: usize,
    /// Index blob id (remote) or index file path (offline).
    pub index_id: Option<String>,
    pub available_backends: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageUsage>,
}
