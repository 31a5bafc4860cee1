//! Backend selection.
//!
//! Probes an ordered list of interchangeable backends once and binds to
//! the first one that answers. There are no retries and no later health
//! checks.

use crate::blobs::BlobBackend;
use crate::error::{Result, StoreError};
use tracing::{info, warn};

/// The backend picked by [`BackendSelector::select`].
pub struct Selection {
    pub backend: Box<dyn BlobBackend>,
    /// Names of every configured backend, in probe order.
    pub candidates: Vec<String>,
}

/// Ordered list of backends, preferred first.
pub struct BackendSelector {
    backends: Vec<Box<dyn BlobBackend>>,
}

impl BackendSelector {
    pub fn new(preferred: Box<dyn BlobBackend>) -> Self {
        Self {
            backends: vec![preferred],
        }
    }

    pub fn with_alternate(mut self, backend: Box<dyn BlobBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Backend names in probe order.
    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Bind to the first reachable backend.
    pub fn select(self) -> Result<Selection> {
        let candidates = self.names();
        let mut failures = Vec::new();

        for backend in self.backends {
            match backend.probe() {
                Ok(()) => {
                    info!(
                        backend = backend.name(),
                        endpoint = %backend.endpoint(),
                        "using paste backend"
                    );
                    return Ok(Selection {
                        backend,
                        candidates,
                    });
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "backend unreachable, skipping");
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        Err(StoreError::NoBackendReachable(failures))
    }
}
