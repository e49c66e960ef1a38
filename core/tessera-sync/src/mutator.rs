//! Write-side contract: atomic "persist + publish".
//!
//! The mutator is the invariant enforcer of the fabric. Every mutation
//! persists the object and publishes the matching client frames as one
//! transaction, so a subscriber can never observe a publish without the
//! persist (or the reverse). Cross-chunk moves publish twice — the diff on
//! the old chunk, a headered full-state add on the new one — and the
//! `from` header keeps dual subscribers down to a single visible event.

use crate::loader::hydrate_records;
use crate::protocol::{self, AddMessage, ModMessage, RemMessage, ServerMessage};
use crate::{Loader, SyncResult};
use async_trait::async_trait;
use std::sync::Arc;
use tessera_model::{Object, ObjectRegistry};
use tessera_store::{Batch, KvBackend};
use tessera_types::{ChunkKey, IdGen, ObjectId};
use tracing::debug;

/// A type that can persist and publish object mutations.
///
/// Mutation sites own their mutator (adapters are not safe for concurrent
/// use of one instance); take one per writer task.
#[async_trait]
pub trait Mutator: Send + Sync {
    /// Persists a new object and publishes its `add`. Assigns an id when the
    /// object has none. Fails with a conflict — and publishes nothing — when
    /// the id is already taken.
    async fn create(&self, obj: &mut dyn Object) -> SyncResult<()>;

    /// Resolves the object's staged diff, persists the result, and publishes
    /// the `mod` (plus the cross-chunk `add` when the object moved).
    async fn modify(&self, obj: &mut dyn Object) -> SyncResult<()>;

    /// Removes the object from the store and publishes its `rem` on the
    /// chunk clients currently see it in.
    async fn delete(&self, obj: &dyn Object) -> SyncResult<()>;

    /// Releases adapter-scoped resources.
    async fn close(&self) -> SyncResult<()>;
}

fn member_key(type_key: &str, id: &ObjectId) -> String {
    format!("{type_key}:{id}")
}

/// Mutator + loader over a key-value backend.
///
/// Layout: each chunk key holds a set of `type:id` members; each member key
/// holds the object record. All mutations ride a single [`Batch`], publishes
/// included.
pub struct KvStore {
    backend: Arc<dyn KvBackend>,
    registry: Arc<ObjectRegistry>,
    ids: Arc<IdGen>,
}

impl KvStore {
    pub fn new(backend: Arc<dyn KvBackend>, registry: Arc<ObjectRegistry>) -> Self {
        Self::with_ids(backend, registry, Arc::new(IdGen::system()))
    }

    /// A store drawing object ids from the supplied source. Tests use a
    /// seeded source to get predictable ids.
    pub fn with_ids(
        backend: Arc<dyn KvBackend>,
        registry: Arc<ObjectRegistry>,
        ids: Arc<IdGen>,
    ) -> Self {
        Self {
            backend,
            registry,
            ids,
        }
    }
}

#[async_trait]
impl Mutator for KvStore {
    async fn create(&self, obj: &mut dyn Object) -> SyncResult<()> {
        if obj.id().is_none() {
            obj.set_id(self.ids.next_id())?;
        }
        obj.resolve();

        let record = obj.to_record()?;
        let member = record.member_key();
        let chunk = record.sub.clone();

        let add = ServerMessage::Add(AddMessage {
            state: obj.state(),
            id: record.id.clone(),
            s_key: chunk.clone(),
            ps_key: None,
            v: obj.version(),
            t: record.t.clone(),
        });

        let batch = Batch::new()
            .set_nx(member.clone(), record.encode()?)
            .set_add(chunk.clone(), member)
            .publish(chunk, add.encode()?);

        self.backend.apply(batch).await?;
        debug!(id = %record.id, t = %record.t, "created object");
        Ok(())
    }

    async fn modify(&self, obj: &mut dyn Object) -> SyncResult<()> {
        let psk = obj.prev_sub_key();
        let nsk = obj.sub_key();
        let simple = psk == nsk;

        let diff = obj.resolve();
        let record = obj.to_record()?;
        let member = record.member_key();

        let mod_msg = ServerMessage::Mod(ModMessage {
            diff,
            id: record.id.clone(),
            v: obj.version(),
            s_key: psk.clone(),
            ns_key: (!simple).then(|| nsk.clone()),
        });

        let batch = if simple {
            // The set-add is redundant for an existing object, but repairs a
            // missing membership entry.
            Batch::new()
                .set_add(nsk.clone(), member.clone())
                .set(member, record.encode()?)
                .publish(psk, mod_msg.encode()?)
        } else {
            let add = ServerMessage::Add(AddMessage {
                state: obj.state(),
                id: record.id.clone(),
                s_key: nsk.clone(),
                ps_key: Some(psk.clone()),
                v: obj.version(),
                t: record.t.clone(),
            });
            let headered = protocol::encode_from(&psk, &add.encode()?);

            Batch::new()
                .set_remove(psk.clone(), member.clone())
                .set_add(nsk.clone(), member.clone())
                .set(member, record.encode()?)
                .publish(psk, mod_msg.encode()?)
                .publish(nsk, headered)
        };

        self.backend.apply(batch).await?;
        Ok(())
    }

    async fn delete(&self, obj: &dyn Object) -> SyncResult<()> {
        // The previous subscription key: if the object was mid-move, clients
        // still believe it is in the old chunk.
        let psk = obj.prev_sub_key();
        let id = obj.id().ok_or(tessera_model::Error::MissingId)?;
        let member = member_key(obj.type_key(), id);

        let rem = ServerMessage::Rem(RemMessage {
            s_key: psk.clone(),
            t: obj.type_key().to_string(),
            id: id.clone(),
        });

        let batch = Batch::new()
            .set_remove(psk.clone(), member.clone())
            .delete(member)
            .publish(psk, rem.encode()?);

        self.backend.apply(batch).await?;
        Ok(())
    }

    async fn close(&self) -> SyncResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Loader for KvStore {
    async fn load_by_chunks(&self, chunks: &[ChunkKey]) -> SyncResult<Vec<Box<dyn Object>>> {
        let blobs = self.backend.fetch_chunks(chunks).await?;
        Ok(hydrate_records(&self.registry, blobs))
    }

    async fn close(&self) -> SyncResult<()> {
        Ok(())
    }
}
