//! Key-value backend contract.

use crate::StoreResult;
use async_trait::async_trait;
use tessera_types::ChunkKey;

/// One operation inside an atomic [`Batch`].
#[derive(Debug, Clone)]
pub enum Op {
    /// Store `value` under `key` only if `key` does not exist. An existing
    /// key fails the whole batch with
    /// [`StoreError::Conflict`](crate::StoreError::Conflict) before any op
    /// applies.
    SetNx { key: String, value: Vec<u8> },
    /// Store `value` under `key` unconditionally.
    Set { key: String, value: Vec<u8> },
    /// Remove `key`.
    Delete { key: String },
    /// Add `member` to the membership set of `chunk`.
    SetAdd { chunk: ChunkKey, member: String },
    /// Remove `member` from the membership set of `chunk`.
    SetRemove { chunk: ChunkKey, member: String },
    /// Publish `payload` on the `topic` channel, ordered with the batch.
    Publish { topic: ChunkKey, payload: Vec<u8> },
}

/// An all-or-nothing group of storage and publish operations.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<Op>,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nx(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.ops.push(Op::SetNx {
            key: key.into(),
            value,
        });
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.ops.push(Op::Set {
            key: key.into(),
            value,
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(Op::Delete { key: key.into() });
        self
    }

    pub fn set_add(mut self, chunk: ChunkKey, member: impl Into<String>) -> Self {
        self.ops.push(Op::SetAdd {
            chunk,
            member: member.into(),
        });
        self
    }

    pub fn set_remove(mut self, chunk: ChunkKey, member: impl Into<String>) -> Self {
        self.ops.push(Op::SetRemove {
            chunk,
            member: member.into(),
        });
        self
    }

    pub fn publish(mut self, topic: ChunkKey, payload: Vec<u8>) -> Self {
        self.ops.push(Op::Publish { topic, payload });
        self
    }

    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A key-value store with per-chunk membership sets.
///
/// Implementations commit [`apply`](KvBackend::apply) atomically: either
/// every op in the batch takes effect (publishes included, in batch order)
/// or none does.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Applies `batch` atomically.
    async fn apply(&self, batch: Batch) -> StoreResult<()>;

    /// Returns the stored blob of every member of the given chunk sets.
    /// Order is unspecified.
    async fn fetch_chunks(&self, chunks: &[ChunkKey]) -> StoreResult<Vec<Vec<u8>>>;
}
