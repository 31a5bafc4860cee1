//! # pastedb
//!
//! A small key-value record store whose storage is a text-sharing ("paste")
//! service, or a local directory when running offline.
//!
//! ## Core Concepts
//!
//! - **Blobs**: opaque text documents; the backend assigns their ids
//! - **Records**: JSON objects with timestamps and string metadata, one blob each
//! - **Index**: maps keys to the blob currently holding each record; itself
//!   persisted as a blob (or a file) after every change
//! - **Selection**: several interchangeable paste services, probed once at
//!   startup, first responsive one wins
//!
//! ## Example
//!
//! ```ignore
//! use pastedb::{Store, StoreConfig};
//! use serde_json::json;
//!
//! let store = Store::open(StoreConfig::offline("./paste_storage"))?;
//!
//! store.create("u1", &json!({"name": "Ana", "age": 30}), None)?;
//! store.update("u1", &json!({"name": "Ana", "age": 31}), None)?;
//!
//! assert_eq!(store.search("ana", None), vec!["u1"]);
//! let backup = store.backup(None)?;
//! ```

pub mod blobs;
pub mod error;
pub mod index;
pub mod remote;
pub mod selector;
pub mod store;
pub mod types;

// Re-exports
pub use blobs::{BlobBackend, LocalBlobStorage, MemoryBlobStorage};
pub use error::{Result, StoreError};
pub use index::{IndexLocation, IndexManager};
pub use remote::{
    DPasteService, HastebinService, HttpSettings, PasteEeService, SafoneService, ServiceKind,
};
pub use selector::{BackendSelector, Selection};
pub use store::{BackendConfig, Store, StoreConfig};
pub use types::*;
