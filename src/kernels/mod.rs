//! This module contains the compression kernels used as complexity proxies, and
//! the capability-checked registry that maps backend names to them.
//!
//! Every kernel is stateless: it owns nothing but its fixed level, and can be
//! called from any worker thread on independent buffers without
//! synchronization. The registry is built once at startup and shared read-only.

use std::fmt;
use std::sync::Arc;

use crate::error::CoffeeError;
use crate::types::Backend;

pub mod bzip;
pub mod gzip;
#[cfg(feature = "zstd")]
pub mod zstd;

//==================================================================================
// 1. The Backend Contract
//==================================================================================

/// One lossless compressor, reduced to the only thing the estimator needs from
/// it: how many bytes the compressed form of a buffer takes.
pub trait CompressionBackend: Send + Sync + fmt::Debug {
    /// The name this kernel is registered under.
    fn kind(&self) -> Backend;

    /// Compresses `bytes` and returns the compressed length.
    ///
    /// Must be deterministic and free of side effects.
    fn compress_len(&self, bytes: &[u8]) -> Result<usize, CoffeeError>;
}

//==================================================================================
// 2. Registry
//==================================================================================

/// An immutable table of the backends usable in this runtime.
///
/// A `Backend` that parses but is absent here yields `BackendUnavailable`; it is
/// never replaced by another backend.
#[derive(Clone)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn CompressionBackend>>,
}

impl BackendRegistry {
    /// Registers every backend compiled into this build.
    pub fn detect() -> Self {
        let mut backends: Vec<Arc<dyn CompressionBackend>> = vec![
            Arc::new(gzip::GzipBackend::default()),
            Arc::new(bzip::BzipBackend::default()),
        ];
        #[cfg(feature = "zstd")]
        backends.push(Arc::new(zstd::ZstdBackend));

        let registry = Self { backends };
        log::debug!("compression backends available: {:?}", registry.available());
        registry
    }

    /// A copy of this registry with `backend` removed, modelling a runtime in
    /// which its implementation is missing.
    pub fn without(&self, backend: Backend) -> Self {
        Self {
            backends: self
                .backends
                .iter()
                .filter(|b| b.kind() != backend)
                .cloned()
                .collect(),
        }
    }

    /// Backends that can be resolved, in registration order.
    pub fn available(&self) -> Vec<Backend> {
        self.backends.iter().map(|b| b.kind()).collect()
    }

    pub fn is_available(&self, backend: Backend) -> bool {
        self.backends.iter().any(|b| b.kind() == backend)
    }

    /// Looks up the implementation for `backend`.
    ///
    /// # Errors
    /// Returns `CoffeeError::BackendUnavailable` naming the backend if it is not
    /// registered.
    pub fn resolve(&self, backend: Backend) -> Result<&dyn CompressionBackend, CoffeeError> {
        self.backends
            .iter()
            .find(|b| b.kind() == backend)
            .map(|b| b.as_ref())
            .ok_or(CoffeeError::BackendUnavailable(backend))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::detect()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("available", &self.available())
            .finish()
    }
}
