//! Document backend contract.

use crate::StoreResult;
use async_trait::async_trait;
use tessera_types::{ChunkKey, ObjectId};

/// A document store holding one record per object id, queryable by the
/// record's chunk field.
///
/// The chunk is passed alongside the blob so backends can index it without
/// parsing the record.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Stores a new record. Fails with
    /// [`StoreError::Conflict`](crate::StoreError::Conflict) if a record with
    /// this id already exists.
    async fn insert(&self, id: &ObjectId, chunk: &ChunkKey, record: Vec<u8>) -> StoreResult<()>;

    /// Stores a record, replacing any existing one with the same id.
    async fn upsert(&self, id: &ObjectId, chunk: &ChunkKey, record: Vec<u8>) -> StoreResult<()>;

    /// Removes the record with the given id.
    async fn remove(&self, id: &ObjectId) -> StoreResult<()>;

    /// Returns the record of every object whose chunk field is in `chunks`.
    /// Order is unspecified.
    async fn find_by_chunks(&self, chunks: &[ChunkKey]) -> StoreResult<Vec<Vec<u8>>>;
}
