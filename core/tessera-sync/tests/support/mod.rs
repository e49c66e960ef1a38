//! Shared fixtures for the sync integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tessera_model::{JsonObject, Object, ObjectRegistry};
use tessera_store::{KvBackend, MemoryKv};
use tessera_sync::socket::mock::{self, MockRemote};
use tessera_sync::{
    Broker, KvStore, Loader, Session, SessionConfig, SessionContext, SessionHandle, SessionHooks,
};
use tessera_types::{ChunkKey, IdGen};
use tokio::sync::mpsc;

pub fn chunk(s: &str) -> ChunkKey {
    ChunkKey::parse(s).unwrap()
}

/// JSON for a subscription update frame.
pub fn subscribe_json(add: &[&str], remove: &[&str]) -> String {
    let add: Vec<_> = add.iter().map(|s| format!("\"{s}\"")).collect();
    let remove: Vec<_> = remove.iter().map(|s| format!("\"{s}\"")).collect();
    format!(
        "{{\"method\":\"updateSubscription\",\"mapID\":\"m\",\"add\":[{}],\"remove\":[{}]}}",
        add.join(","),
        remove.join(",")
    )
}

/// An in-process fabric: broker + memory KV substrate + registry.
pub struct TestFabric {
    pub broker: Broker,
    pub backend: Arc<MemoryKv>,
    pub registry: Arc<ObjectRegistry>,
}

impl TestFabric {
    pub fn new() -> Self {
        let broker = Broker::new();
        let backend = Arc::new(MemoryKv::new(Arc::new(broker.clone())));
        let mut registry = ObjectRegistry::new();
        registry.register_json("c:h");
        registry.register_json("c:o");
        Self {
            broker,
            backend,
            registry: Arc::new(registry),
        }
    }

    /// A write/read adapter with a deterministic id source.
    pub fn store(&self, seed: u64) -> KvStore {
        KvStore::with_ids(
            self.backend.clone() as Arc<dyn KvBackend>,
            self.registry.clone(),
            Arc::new(IdGen::seeded(seed)),
        )
    }

    pub fn loader(&self) -> Arc<dyn Loader> {
        Arc::new(self.store(0))
    }

    /// Spawns a session over a mock socket with no-op hooks.
    pub fn spawn_session(&self) -> (Session, MockRemote) {
        self.spawn_session_with(Arc::new(tessera_sync::NoopHooks), SessionConfig::default())
    }

    pub fn spawn_session_with(
        &self,
        hooks: Arc<dyn SessionHooks>,
        config: SessionConfig,
    ) -> (Session, MockRemote) {
        let (writer, reader, remote) = mock::pair();
        let session = Session::spawn(
            SessionContext {
                broker: self.broker.clone(),
                loader: self.loader(),
                hooks,
                config,
            },
            Box::new(writer),
            Box::new(reader),
        );
        (session, remote)
    }
}

/// Hooks that report subscription completions over a channel, so tests know
/// the moment a subscription (and its snapshot) took effect.
pub struct NotifyHooks {
    tx: mpsc::UnboundedSender<Vec<ChunkKey>>,
}

impl NotifyHooks {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<ChunkKey>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl SessionHooks for NotifyHooks {
    async fn on_subscribe(
        &self,
        _session: &SessionHandle,
        added: &[ChunkKey],
        _objects: &[Box<dyn Object>],
    ) {
        let _ = self.tx.send(added.to_vec());
    }
}

/// Next text frame from the session, parsed as JSON. Panics after 2s.
pub async fn recv_json(remote: &mut MockRemote) -> Value {
    let bytes = tokio::time::timeout(Duration::from_secs(2), remote.next_text())
        .await
        .expect("timed out waiting for frame")
        .expect("socket closed");
    serde_json::from_slice(&bytes).expect("frame is not JSON")
}

/// Waits for a subscription completion notification.
pub async fn await_subscribed(rx: &mut mpsc::UnboundedReceiver<Vec<ChunkKey>>) -> Vec<ChunkKey> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for on_subscribe")
        .expect("hooks dropped")
}

/// A ready-to-create object in `home` with the given fields.
pub fn object_in(home: &str, state: Value) -> JsonObject {
    let map = match state {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    };
    JsonObject::with_state("c:h", chunk(home), map)
}
