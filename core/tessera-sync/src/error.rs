//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid message format.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage error. `StoreError::Conflict` inside means a create lost a
    /// conditional write and nothing was published.
    #[error("storage error: {0}")]
    Store(#[from] tessera_store::StoreError),

    /// Object-model error.
    #[error("object error: {0}")]
    Model(#[from] tessera_model::Error),

    /// Session transport failure (write error, missed deadline).
    #[error("socket error: {0}")]
    Socket(String),

    /// A coordination channel closed.
    #[error("channel closed")]
    ChannelClosed,
}
