//! Blob backends.
//!
//! A backend stores opaque text blobs under identifiers it assigns itself.
//! It offers no key lookup, no transactions, and delete is advisory: the
//! store layers its key space on top through the index.

mod memory;
mod storage;

pub use memory::MemoryBlobStorage;
pub use storage::LocalBlobStorage;

use crate::error::Result;
use crate::types::{BlobId, BlobRequest, DeleteOutcome, StorageUsage};
use std::sync::Arc;
use tracing::{debug, warn};

/// Uniform capability offered by every backend.
pub trait BlobBackend: Send + Sync {
    /// Human readable backend name.
    fn name(&self) -> &str;

    /// Base URL or storage directory.
    fn endpoint(&self) -> String;

    /// Upload `request.content` as a new blob.
    fn create_blob(&self, request: &BlobRequest<'_>) -> Result<BlobId>;

    /// Fetch a blob's content. Transport failures are errors, never empty content.
    fn fetch_blob(&self, id: &BlobId) -> Result<String>;

    /// Delete a blob if the backend supports it.
    fn delete_blob(&self, _id: &BlobId) -> Result<DeleteOutcome> {
        Ok(DeleteOutcome::Unsupported)
    }

    /// Cheap reachability check used by backend selection.
    fn probe(&self) -> Result<()> {
        Ok(())
    }

    /// Persist a standalone document such as a backup, returning its identifier.
    fn write_document(&self, request: &BlobRequest<'_>) -> Result<String> {
        self.create_blob(request).map(|id| id.0)
    }

    /// Read back a document written by [`BlobBackend::write_document`].
    fn read_document(&self, id: &str) -> Result<String> {
        self.fetch_blob(&BlobId::from(id))
    }

    /// Disk footprint, for backends that have one.
    fn usage(&self) -> Result<Option<StorageUsage>> {
        Ok(None)
    }
}

impl<B: BlobBackend + ?Sized> BlobBackend for Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn endpoint(&self) -> String {
        (**self).endpoint()
    }

    fn create_blob(&self, request: &BlobRequest<'_>) -> Result<BlobId> {
        (**self).create_blob(request)
    }

    fn fetch_blob(&self, id: &BlobId) -> Result<String> {
        (**self).fetch_blob(id)
    }

    fn delete_blob(&self, id: &BlobId) -> Result<DeleteOutcome> {
        (**self).delete_blob(id)
    }

    fn probe(&self) -> Result<()> {
        (**self).probe()
    }

    fn write_document(&self, request: &BlobRequest<'_>) -> Result<String> {
        (**self).write_document(request)
    }

    fn read_document(&self, id: &str) -> Result<String> {
        (**self).read_document(id)
    }

    fn usage(&self) -> Result<Option<StorageUsage>> {
        (**self).usage()
    }
}

/// Best-effort delete of a blob nothing references any more.
///
/// Failures are logged and dropped; an undeleted blob stays behind as an
/// orphan.
pub(crate) fn discard_blob(backend: &dyn BlobBackend, id: &BlobId, what: &str) {
    match backend.delete_blob(id) {
        Ok(DeleteOutcome::Deleted) => debug!(backend = backend.name(), %id, "deleted {what}"),
        Ok(outcome) => debug!(backend = backend.name(), %id, ?outcome, "left {what} in place"),
        Err(e) => warn!(backend = backend.name(), %id, error = %e, "failed to delete {what}"),
    }
}
