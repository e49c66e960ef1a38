//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write lost: the key already exists. Non-retryable;
    /// nothing was persisted and nothing was published.
    #[error("key already exists: {key}")]
    Conflict { key: String },

    /// No record stored under the given key.
    #[error("no record for key: {key}")]
    NotFound { key: String },

    /// Transient backend failure. The caller decides whether to retry or
    /// rebuild its state from the store.
    #[error("backend error: {0}")]
    Backend(String),
}
