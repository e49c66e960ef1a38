//! In-memory backends for tests and single-process deployments.

use crate::{Batch, DocumentBackend, EventSink, KvBackend, Op, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tessera_types::{ChunkKey, ObjectId};
use tracing::warn;

#[derive(Default)]
struct KvInner {
    values: HashMap<String, Vec<u8>>,
    sets: HashMap<ChunkKey, BTreeSet<String>>,
}

/// An in-memory [`KvBackend`].
///
/// Batches commit under one lock, and publish ops dispatch through the sink
/// inside that critical section — the same atomicity a remote key-value
/// store provides with a MULTI/EXEC transaction around storage ops and
/// publishes.
pub struct MemoryKv {
    inner: Mutex<KvInner>,
    sink: Arc<dyn EventSink>,
}

impl MemoryKv {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Mutex::new(KvInner::default()),
            sink,
        }
    }

    /// The stored blob under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().expect("kv lock poisoned").values.get(key).cloned()
    }

    /// The membership set of `chunk`.
    pub fn members(&self, chunk: &ChunkKey) -> Vec<String> {
        self.inner
            .lock()
            .expect("kv lock poisoned")
            .sets
            .get(chunk)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn apply(&self, batch: Batch) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("kv lock poisoned");

        // Conditional writes are checked up front so a losing batch has no
        // effect at all, publishes included.
        for op in batch.ops() {
            if let Op::SetNx { key, .. } = op {
                if inner.values.contains_key(key) {
                    return Err(StoreError::Conflict { key: key.clone() });
                }
            }
        }

        for op in batch.ops() {
            match op {
                Op::SetNx { key, value } | Op::Set { key, value } => {
                    inner.values.insert(key.clone(), value.clone());
                }
                Op::Delete { key } => {
                    inner.values.remove(key);
                }
                Op::SetAdd { chunk, member } => {
                    inner.sets.entry(chunk.clone()).or_default().insert(member.clone());
                }
                Op::SetRemove { chunk, member } => {
                    if let Some(set) = inner.sets.get_mut(chunk) {
                        set.remove(member);
                    }
                }
                Op::Publish { topic, payload } => {
                    self.sink.publish(topic, payload);
                }
            }
        }
        Ok(())
    }

    async fn fetch_chunks(&self, chunks: &[ChunkKey]) -> StoreResult<Vec<Vec<u8>>> {
        let inner = self.inner.lock().expect("kv lock poisoned");
        let mut out = Vec::new();
        for chunk in chunks {
            let Some(members) = inner.sets.get(chunk) else {
                continue;
            };
            for member in members {
                match inner.values.get(member) {
                    Some(blob) => out.push(blob.clone()),
                    None => warn!(%chunk, member = %member, "chunk set member has no stored record"),
                }
            }
        }
        Ok(out)
    }
}

struct DocEntry {
    chunk: ChunkKey,
    record: Vec<u8>,
}

/// An in-memory [`DocumentBackend`].
#[derive(Default)]
pub struct MemoryDocs {
    docs: Mutex<HashMap<ObjectId, DocEntry>>,
}

impl MemoryDocs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored record for `id`, if any.
    pub fn get(&self, id: &ObjectId) -> Option<Vec<u8>> {
        self.docs
            .lock()
            .expect("doc lock poisoned")
            .get(id)
            .map(|e| e.record.clone())
    }
}

#[async_trait]
impl DocumentBackend for MemoryDocs {
    async fn insert(&self, id: &ObjectId, chunk: &ChunkKey, record: Vec<u8>) -> StoreResult<()> {
        let mut docs = self.docs.lock().expect("doc lock poisoned");
        if docs.contains_key(id) {
            return Err(StoreError::Conflict {
                key: id.to_string(),
            });
        }
        docs.insert(
            id.clone(),
            DocEntry {
                chunk: chunk.clone(),
                record,
            },
        );
        Ok(())
    }

    async fn upsert(&self, id: &ObjectId, chunk: &ChunkKey, record: Vec<u8>) -> StoreResult<()> {
        self.docs.lock().expect("doc lock poisoned").insert(
            id.clone(),
            DocEntry {
                chunk: chunk.clone(),
                record,
            },
        );
        Ok(())
    }

    async fn remove(&self, id: &ObjectId) -> StoreResult<()> {
        match self.docs.lock().expect("doc lock poisoned").remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                key: id.to_string(),
            }),
        }
    }

    async fn find_by_chunks(&self, chunks: &[ChunkKey]) -> StoreResult<Vec<Vec<u8>>> {
        let docs = self.docs.lock().expect("doc lock poisoned");
        Ok(docs
            .values()
            .filter(|e| chunks.contains(&e.chunk))
            .map(|e| e.record.clone())
            .collect())
    }
}
