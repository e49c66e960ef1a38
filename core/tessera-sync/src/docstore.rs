//! Mutator + loader over a document backend.
//!
//! Document stores cannot fold publishes into the write the way the
//! key-value batch does, so this adapter persists first and publishes after
//! the persist succeeds. A backend error aborts the mutation before
//! anything is published; a publish therefore always refers to persisted
//! state, though a crash between the two steps can drop a publish — clients
//! recover on their next snapshot.

use crate::loader::hydrate_records;
use crate::protocol::{self, AddMessage, ModMessage, RemMessage, ServerMessage};
use crate::{Loader, Mutator, SyncResult};
use async_trait::async_trait;
use std::sync::Arc;
use tessera_model::{Object, ObjectRegistry};
use tessera_store::{DocumentBackend, EventSink};
use tessera_types::{ChunkKey, IdGen};

/// Mutator + loader over a document backend, publishing through an
/// [`EventSink`].
pub struct DocStore {
    backend: Arc<dyn DocumentBackend>,
    registry: Arc<ObjectRegistry>,
    sink: Arc<dyn EventSink>,
    ids: Arc<IdGen>,
}

impl DocStore {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        registry: Arc<ObjectRegistry>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_ids(backend, registry, sink, Arc::new(IdGen::system()))
    }

    /// A store drawing object ids from the supplied source.
    pub fn with_ids(
        backend: Arc<dyn DocumentBackend>,
        registry: Arc<ObjectRegistry>,
        sink: Arc<dyn EventSink>,
        ids: Arc<IdGen>,
    ) -> Self {
        Self {
            backend,
            registry,
            sink,
            ids,
        }
    }
}

#[async_trait]
impl Mutator for DocStore {
    async fn create(&self, obj: &mut dyn Object) -> SyncResult<()> {
        if obj.id().is_none() {
            obj.set_id(self.ids.next_id())?;
        }
        obj.resolve();

        let record = obj.to_record()?;
        let add = ServerMessage::Add(AddMessage {
            state: obj.state(),
            id: record.id.clone(),
            s_key: record.sub.clone(),
            ps_key: None,
            v: obj.version(),
            t: record.t.clone(),
        });
        let payload = add.encode()?;

        self.backend
            .insert(&record.id, &record.sub, record.encode()?)
            .await?;
        self.sink.publish(&record.sub, &payload);
        Ok(())
    }

    async fn modify(&self, obj: &mut dyn Object) -> SyncResult<()> {
        let psk = obj.prev_sub_key();
        let nsk = obj.sub_key();
        let simple = psk == nsk;

        let diff = obj.resolve();
        let record = obj.to_record()?;

        let mod_msg = ServerMessage::Mod(ModMessage {
            diff,
            id: record.id.clone(),
            v: obj.version(),
            s_key: psk.clone(),
            ns_key: (!simple).then(|| nsk.clone()),
        });
        let mod_payload = mod_msg.encode()?;

        if simple {
            self.backend
                .upsert(&record.id, &record.sub, record.encode()?)
                .await?;
            self.sink.publish(&psk, &mod_payload);
            return Ok(());
        }

        let add = ServerMessage::Add(AddMessage {
            state: obj.state(),
            id: record.id.clone(),
            s_key: nsk.clone(),
            ps_key: Some(psk.clone()),
            v: obj.version(),
            t: record.t.clone(),
        });
        let headered = protocol::encode_from(&psk, &add.encode()?);

        self.backend
            .upsert(&record.id, &record.sub, record.encode()?)
            .await?;
        self.sink.publish(&psk, &mod_payload);
        self.sink.publish(&nsk, &headered);
        Ok(())
    }

    async fn delete(&self, obj: &dyn Object) -> SyncResult<()> {
        let psk = obj.prev_sub_key();
        let id = obj.id().ok_or(tessera_model::Error::MissingId)?;

        let rem = ServerMessage::Rem(RemMessage {
            s_key: psk.clone(),
            t: obj.type_key().to_string(),
            id: id.clone(),
        });
        let payload = rem.encode()?;

        self.backend.remove(id).await?;
        self.sink.publish(&psk, &payload);
        Ok(())
    }

    async fn close(&self) -> SyncResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Loader for DocStore {
    async fn load_by_chunks(&self, chunks: &[ChunkKey]) -> SyncResult<Vec<Box<dyn Object>>> {
        let blobs = self.backend.find_by_chunks(chunks).await?;
        Ok(hydrate_records(&self.registry, blobs))
    }

    async fn close(&self) -> SyncResult<()> {
        Ok(())
    }
}
