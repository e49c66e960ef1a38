//! Core type definitions for Tessera.
//!
//! This crate defines the fundamental, schema-agnostic types used throughout
//! the sync fabric:
//! - Object identifiers (fixed-width alphanumeric, chunk-layout safe)
//! - Chunk subscription keys
//! - Session identifiers
//!
//! All domain-specific object shapes belong to the applications built on top
//! of the fabric, not here.

mod chunk;
mod ids;

pub use chunk::ChunkKey;
pub use ids::{IdGen, ObjectId, SessionId, ID_LEN};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid object id {0:?}: must be {ID_LEN} alphanumeric characters")]
    InvalidObjectId(String),

    #[error("invalid chunk key {0:?}: must be non-empty and contain no '{{'")]
    InvalidChunkKey(String),
}
