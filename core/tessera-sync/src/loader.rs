//! Read-side contract: bulk snapshot hydration.

use crate::SyncResult;
use async_trait::async_trait;
use tessera_model::{Object, ObjectRegistry, Record};
use tessera_types::ChunkKey;
use tracing::warn;

/// A type that returns every object currently persisted in a set of chunks.
///
/// Each session owns its own loader; adapters are not safe for concurrent
/// use of one instance.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Loads all objects belonging to `chunks`. Order is unspecified.
    async fn load_by_chunks(&self, chunks: &[ChunkKey]) -> SyncResult<Vec<Box<dyn Object>>>;

    /// Releases adapter-scoped resources.
    async fn close(&self) -> SyncResult<()>;
}

/// Hydrates stored records into typed containers.
///
/// The type tag is probed first so the registry can pick a container.
/// Records with unknown tags, and records that fail to decode, are skipped
/// with a warning; everything else is returned.
pub fn hydrate_records(registry: &ObjectRegistry, blobs: Vec<Vec<u8>>) -> Vec<Box<dyn Object>> {
    let mut objects = Vec::with_capacity(blobs.len());
    for blob in blobs {
        let type_key = match Record::probe_type(&blob) {
            Ok(t) => t,
            Err(err) => {
                warn!(%err, "skipping record with unreadable type tag");
                continue;
            }
        };
        let Some(mut container) = registry.construct(&type_key) else {
            warn!(type_key = %type_key, "no container registered for type, skipping record");
            continue;
        };
        let record = match Record::decode(&blob) {
            Ok(r) => r,
            Err(err) => {
                warn!(type_key = %type_key, %err, "skipping undecodable record");
                continue;
            }
        };
        if let Err(err) = container.load_record(record) {
            warn!(type_key = %type_key, %err, "skipping record that failed to hydrate");
            continue;
        }
        objects.push(container);
    }
    objects
}
