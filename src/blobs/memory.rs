//! In-memory blob storage.
//!
//! Useful for embedding and for tests: every failure mode a remote service
//! can show (unreachable, failing uploads, failing fetches, no delete) can
//! be switched on at runtime.

use crate::blobs::BlobBackend;
use crate::error::{Result, StoreError};
use crate::types::{BlobId, BlobRequest, DeleteOutcome};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Blob storage held in process memory.
pub struct MemoryBlobStorage {
    name: String,
    blobs: Mutex<HashMap<BlobId, String>>,
    next_id: AtomicU64,

    reachable: AtomicBool,
    supports_delete: AtomicBool,
    fail_create: AtomicBool,
    fail_fetch: AtomicBool,
    fail_delete: AtomicBool,

    creates: AtomicU64,
    deletes: AtomicU64,
}

impl Default for MemoryBlobStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            reachable: AtomicBool::new(true),
            supports_delete: AtomicBool::new(true),
            fail_create: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            creates: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    /// Builder-style toggle for delete support.
    pub fn without_delete(self) -> Self {
        self.supports_delete.store(false, Ordering::SeqCst);
        self
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Number of blobs currently held.
    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }

    pub fn contains(&self, id: &BlobId) -> bool {
        self.blobs.lock().contains_key(id)
    }

    /// Raw content of a blob, bypassing failure injection.
    pub fn raw(&self, id: &BlobId) -> Option<String> {
        self.blobs.lock().get(id).cloned()
    }

    /// Overwrite a blob's content in place, bypassing failure injection.
    pub fn put_raw(&self, id: &BlobId, content: impl Into<String>) {
        self.blobs.lock().insert(id.clone(), content.into());
    }

    /// Successful uploads so far.
    pub fn create_count(&self) -> u64 {
        self.creates.load(Ordering::SeqCst)
    }

    /// Successful deletes so far.
    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    fn injected(&self, operation: &str) -> StoreError {
        StoreError::UnexpectedResponse {
            url: format!("memory://{}", self.name),
            reason: format!("{operation} failed (injected)"),
        }
    }
}

impl BlobBackend for MemoryBlobStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn create_blob(&self, request: &BlobRequest<'_>) -> Result<BlobId> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(self.injected("create"));
        }

        let id = BlobId(format!("{:08x}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.blobs.lock().insert(id.clone(), request.content.to_string());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn fetch_blob(&self, id: &BlobId) -> Result<String> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(self.injected("fetch"));
        }

        self.blobs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(id.clone()))
    }

    fn delete_blob(&self, id: &BlobId) -> Result<DeleteOutcome> {
        if !self.supports_delete.load(Ordering::SeqCst) {
            return Ok(DeleteOutcome::Unsupported);
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(self.injected("delete"));
        }

        match self.blobs.lock().remove(id) {
            Some(_) => {
                self.deletes.fetch_add(1, Ordering::SeqCst);
                Ok(DeleteOutcome::Deleted)
            }
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    fn probe(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(self.injected("probe"))
        }
    }
}
