//! Key index.
//!
//! Maps logical keys to the blob currently holding each record. The index
//! is loaded lazily on first use and persisted after every mutation, either
//! as a fresh blob on the backend or as a file in the storage directory.

mod manager;

pub use manager::{IndexLocation, IndexManager, INDEX_BLOB_NAME, INDEX_FILE_NAME};
