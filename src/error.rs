// In: src/error.rs

//! This module defines the single, unified error type for the entire coffeematon library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

use crate::types::Backend;

/// A specialized `Result` type for coffeematon operations.
pub type Result<T> = std::result::Result<T, CoffeeError>;

#[derive(Error, Debug)]
pub enum CoffeeError {
    // =========================================================================
    // === Selection & Configuration Errors (raised before any simulation work)
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The selected compression backend was not compiled into this build.
    #[error("Compression backend '{0}' is not available in this runtime")]
    BackendUnavailable(Backend),

    /// The selected automaton variant is registered but cannot be constructed here.
    #[error("Automaton variant '{name}' is not available in this runtime: {reason}")]
    VariantUnavailable { name: String, reason: String },

    // =========================================================================
    // === Pipeline Errors
    // =========================================================================
    /// A compression job failed; the rest of its batch was cancelled.
    #[error("Worker pool batch {batch} failed at job slot {slot}: {source}")]
    WorkerPool {
        batch: u64,
        slot: usize,
        #[source]
        source: Box<CoffeeError>,
    },

    #[error("Compression backend '{backend}' failed: {reason}")]
    Compression { backend: Backend, reason: String },

    /// The results sink could not be written. The row being written is not valid.
    #[error("Failed to persist trajectory row to {location}: {source}")]
    Persistence {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Trajectory store format error: {0}")]
    StoreFormat(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading a config file.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String), // Manual `From` impl is needed as bytemuck::PodCastError doesn't impl Error
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for CoffeeError {
    fn from(err: bytemuck::PodCastError) -> Self {
        CoffeeError::PodCast(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for CoffeeError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        CoffeeError::InternalError(format!("worker pool could not start: {}", err))
    }
}

impl CoffeeError {
    /// A short, stable name for the error kind, used by the CLI when reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            CoffeeError::Configuration(_) => "ConfigurationError",
            CoffeeError::BackendUnavailable(_) => "BackendUnavailable",
            CoffeeError::VariantUnavailable { .. } => "VariantUnavailable",
            CoffeeError::WorkerPool { .. } => "WorkerPoolError",
            CoffeeError::Compression { .. } => "CompressionError",
            CoffeeError::Persistence { .. } => "PersistenceError",
            CoffeeError::StoreFormat(_) => "StoreFormatError",
            CoffeeError::InternalError(_) => "InternalError",
            CoffeeError::Io(_) => "IoError",
            CoffeeError::SerdeJson(_) => "SerdeJsonError",
            CoffeeError::PodCast(_) => "PodCastError",
        }
    }
}
