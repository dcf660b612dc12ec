//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.
//!
//! These errors live at the boundary between the cache facade and the durable
//! medium. The facade catches every one of them: a failing durable tier
//! degrades the affected operation to memory-only behavior and is reported
//! through the diagnostic log, never to callers.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache and durable-medium operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Entry could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Durable medium I/O failure
    #[error("Durable medium I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable medium is out of space for this write
    #[error("Durable quota exceeded: {0}")]
    QuotaExceeded(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
