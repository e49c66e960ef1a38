//! The publish seam between storage transactions and the pub/sub substrate.

use tessera_types::ChunkKey;

/// Accepts publishes on chunk topics.
///
/// A [`KvBackend`](crate::KvBackend) dispatches the publish ops of a batch
/// through its sink inside the same critical section as the storage ops, so
/// per-topic publication order matches commit order.
pub trait EventSink: Send + Sync {
    fn publish(&self, topic: &ChunkKey, payload: &[u8]);
}

/// A sink that discards every publish. For tests that only exercise storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _topic: &ChunkKey, _payload: &[u8]) {}
}
