//! Object model for Tessera.
//!
//! Defines the contract between application objects and the sync pipeline:
//! - [`Object`] — the versioned entity with a mutable staging diff
//! - [`JsonObject`] — the generic flat-field-map container
//! - [`ObjectRegistry`] — type tag → empty-container factory
//! - [`Record`] — the persisted envelope stores read and write
//!
//! Applications with typed schemas implement [`Object`] directly and register
//! a factory; everything in the pipeline only sees `Box<dyn Object>`.

mod json_object;
mod object;
mod record;
mod registry;

pub use json_object::JsonObject;
pub use object::Object;
pub use record::Record;
pub use registry::ObjectRegistry;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in object-model operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The object has no id yet (only the mutator may assign one).
    #[error("object has no id")]
    MissingId,

    /// An attempt was made to change an already-assigned id.
    #[error("object id is immutable once set (existing {existing}, new {new})")]
    IdImmutable {
        existing: tessera_types::ObjectId,
        new: tessera_types::ObjectId,
    },

    /// A record was hydrated into a container of the wrong type.
    #[error("record type {got:?} does not match container type {expected:?}")]
    TypeMismatch { expected: String, got: String },

    /// A stored record could not be interpreted.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] tessera_types::Error),
}
