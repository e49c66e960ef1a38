mod support;

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use support::{chunk, object_in, TestFabric};
use tessera_model::{JsonObject, Object};
use tessera_store::{MemoryDocs, StoreError};
use tessera_sync::protocol::{decode_line, DeliveryLine};
use tessera_sync::{hydrate_records, Delivery, DocStore, Loader, Mutator, SyncError};
use tessera_types::{IdGen, ObjectId, SessionId};
use tokio::sync::mpsc::UnboundedReceiver;

async fn next_payload(rx: &mut UnboundedReceiver<Delivery>) -> Delivery {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for publish")
        .expect("broker closed stream")
}

fn as_json(payload: &[u8]) -> Value {
    serde_json::from_slice(payload).expect("published payload is not JSON")
}

/// Subscribes an observer identity to the given chunks.
fn observe(fabric: &TestFabric, chunks: &[&str]) -> UnboundedReceiver<Delivery> {
    let id = SessionId::new();
    let rx = fabric.broker.add_subscriber(id);
    let keys: Vec<_> = chunks.iter().map(|c| chunk(c)).collect();
    fabric.broker.subscribe(&id, &keys);
    rx
}

// ── Create ───────────────────────────────────────────────────────

#[tokio::test]
async fn create_persists_and_publishes_add() {
    let fabric = TestFabric::new();
    let mut rx = observe(&fabric, &["m:0|0"]);
    let store = fabric.store(1);

    let mut obj = object_in("m:0|0", json!({"x": 1, "y": 2}));
    store.create(&mut obj).await.unwrap();

    let id = obj.id().unwrap().clone();
    assert_eq!(obj.version(), 1);
    assert!(!obj.changed());

    // Persisted under type:id, member of the chunk set.
    let member = format!("c:h:{id}");
    assert!(fabric.backend.get(&member).is_some());
    assert_eq!(fabric.backend.members(&chunk("m:0|0")), vec![member]);

    let delivery = next_payload(&mut rx).await;
    assert_eq!(delivery.topic, chunk("m:0|0"));
    assert_eq!(
        as_json(&delivery.payload),
        json!({
            "method": "add",
            "state": {"x": 1, "y": 2},
            "id": id.to_string(),
            "sKey": "m:0|0",
            "v": 1,
            "t": "c:h",
        })
    );
}

#[tokio::test]
async fn create_keeps_caller_assigned_id() {
    let fabric = TestFabric::new();
    let store = fabric.store(1);
    let id = ObjectId::parse("abcdefgh12345678").unwrap();

    let mut obj = object_in("m:0|0", json!({}));
    obj.set_id(id.clone()).unwrap();
    store.create(&mut obj).await.unwrap();

    assert_eq!(obj.id(), Some(&id));
}

#[tokio::test]
async fn create_conflict_publishes_nothing() {
    let fabric = TestFabric::new();
    let store = fabric.store(1);
    let id = ObjectId::parse("abcdefgh12345678").unwrap();

    let mut first = object_in("m:0|0", json!({"x": 1}));
    first.set_id(id.clone()).unwrap();
    store.create(&mut first).await.unwrap();

    let mut rx = observe(&fabric, &["m:0|0"]);
    let mut dup = object_in("m:0|0", json!({"x": 99}));
    dup.set_id(id).unwrap();

    let err = store.create(&mut dup).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Store(StoreError::Conflict { .. })
    ));

    // The losing create published nothing and did not overwrite.
    assert!(rx.try_recv().is_err());
    let stored = fabric.backend.get("c:h:abcdefgh12345678").unwrap();
    assert!(String::from_utf8(stored).unwrap().contains("\"x\":1"));
}

// ── Modify ───────────────────────────────────────────────────────

#[tokio::test]
async fn simple_modify_publishes_diff() {
    let fabric = TestFabric::new();
    let store = fabric.store(1);
    let mut obj = object_in("m:0|0", json!({"x": 1, "y": 2}));
    store.create(&mut obj).await.unwrap();

    let mut rx = observe(&fabric, &["m:0|0"]);
    obj.set("x", json!(5));
    store.modify(&mut obj).await.unwrap();

    let delivery = next_payload(&mut rx).await;
    assert_eq!(
        as_json(&delivery.payload),
        json!({
            "method": "mod",
            "diff": {"x": 5},
            "id": obj.id().unwrap().to_string(),
            "v": 2,
            "sKey": "m:0|0",
        })
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn cross_chunk_modify_publishes_mod_and_headered_add() {
    let fabric = TestFabric::new();
    let store = fabric.store(1);
    let mut obj = object_in("m:0|0", json!({"x": 1}));
    store.create(&mut obj).await.unwrap();
    let id = obj.id().unwrap().clone();
    let member = format!("c:h:{id}");

    let mut rx_src = observe(&fabric, &["m:0|0"]);
    let mut rx_dst = observe(&fabric, &["m:1|0"]);

    obj.set("x", json!(2));
    obj.set_chunk(chunk("m:1|0"));
    store.modify(&mut obj).await.unwrap();

    // Source chunk: the mod with nsKey.
    let mod_delivery = next_payload(&mut rx_src).await;
    assert_eq!(
        as_json(&mod_delivery.payload),
        json!({
            "method": "mod",
            "diff": {"x": 2},
            "id": id.to_string(),
            "v": 2,
            "sKey": "m:0|0",
            "nsKey": "m:1|0",
        })
    );

    // Destination chunk: the full add behind a `from` header.
    let add_delivery = next_payload(&mut rx_dst).await;
    match decode_line(&add_delivery.payload).unwrap() {
        DeliveryLine::From { chunk: from, payload } => {
            assert_eq!(from, chunk("m:0|0"));
            assert_eq!(
                as_json(&payload),
                json!({
                    "method": "add",
                    "state": {"x": 2},
                    "id": id.to_string(),
                    "sKey": "m:1|0",
                    "psKey": "m:0|0",
                    "v": 2,
                    "t": "c:h",
                })
            );
        }
        other => panic!("expected headered add, got {other:?}"),
    }

    // Membership moved between chunk sets.
    assert!(fabric.backend.members(&chunk("m:0|0")).is_empty());
    assert_eq!(fabric.backend.members(&chunk("m:1|0")), vec![member]);
}

// ── Delete ───────────────────────────────────────────────────────

#[tokio::test]
async fn delete_publishes_rem_and_clears_store() {
    let fabric = TestFabric::new();
    let store = fabric.store(1);
    let mut obj = object_in("m:0|0", json!({"x": 1}));
    store.create(&mut obj).await.unwrap();
    let id = obj.id().unwrap().clone();
    let member = format!("c:h:{id}");

    let mut rx = observe(&fabric, &["m:0|0"]);
    store.delete(&obj).await.unwrap();

    let delivery = next_payload(&mut rx).await;
    assert_eq!(
        as_json(&delivery.payload),
        json!({
            "method": "rem",
            "sKey": "m:0|0",
            "t": "c:h",
            "id": id.to_string(),
        })
    );
    assert!(fabric.backend.get(&member).is_none());
    assert!(fabric.backend.members(&chunk("m:0|0")).is_empty());
}

#[tokio::test]
async fn delete_mid_move_targets_previous_chunk() {
    let fabric = TestFabric::new();
    let store = fabric.store(1);
    let mut obj = object_in("m:0|0", json!({}));
    store.create(&mut obj).await.unwrap();

    // A staged, unresolved move: clients still see the object in m:0|0.
    obj.set_chunk(chunk("m:1|0"));

    let mut rx = observe(&fabric, &["m:0|0"]);
    store.delete(&obj).await.unwrap();

    let delivery = next_payload(&mut rx).await;
    assert_eq!(as_json(&delivery.payload)["sKey"], "m:0|0");
}

// ── Loader ───────────────────────────────────────────────────────

#[tokio::test]
async fn load_by_chunks_returns_hydrated_objects() {
    let fabric = TestFabric::new();
    let store = fabric.store(1);

    let mut a = object_in("m:0|0", json!({"x": 1}));
    let mut b = object_in("m:1|0", json!({"x": 2}));
    store.create(&mut a).await.unwrap();
    store.create(&mut b).await.unwrap();

    let loaded = Loader::load_by_chunks(&store, &[chunk("m:0|0"), chunk("m:1|0")])
        .await
        .unwrap();
    assert_eq!(loaded.len(), 2);
    let mut ids: Vec<_> = loaded.iter().map(|o| o.id().unwrap().to_string()).collect();
    ids.sort();
    let mut expected = vec![
        a.id().unwrap().to_string(),
        b.id().unwrap().to_string(),
    ];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(loaded.iter().all(|o| o.version() == 1 && !o.changed()));
}

#[tokio::test]
async fn loader_skips_unknown_types() {
    let fabric = TestFabric::new();
    let store = fabric.store(1);

    // "c:x" has no registered container; writes don't consult the registry.
    let mut known = object_in("m:0|0", json!({"x": 1}));
    let mut unknown = JsonObject::new("c:x", chunk("m:0|0"));
    store.create(&mut known).await.unwrap();
    store.create(&mut unknown).await.unwrap();

    let loaded = Loader::load_by_chunks(&store, &[chunk("m:0|0")]).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].type_key(), "c:h");
}

#[test]
fn hydrate_skips_garbage_records() {
    let fabric = TestFabric::new();
    let mut obj = object_in("m:0|0", json!({"x": 1}));
    obj.set_id(ObjectId::parse("abcdefgh12345678").unwrap()).unwrap();
    let good = obj.to_record().unwrap().encode().unwrap();

    let blobs = vec![b"not json at all".to_vec(), good];
    let objects = hydrate_records(&fabric.registry, blobs);
    assert_eq!(objects.len(), 1);
}

// ── Document-store adapter ───────────────────────────────────────

fn doc_store(fabric: &TestFabric) -> DocStore {
    DocStore::with_ids(
        Arc::new(MemoryDocs::new()),
        fabric.registry.clone(),
        Arc::new(fabric.broker.clone()),
        Arc::new(IdGen::seeded(9)),
    )
}

#[tokio::test]
async fn doc_store_create_modify_delete_flow() {
    let fabric = TestFabric::new();
    let store = doc_store(&fabric);
    let mut rx = observe(&fabric, &["m:0|0"]);

    let mut obj = object_in("m:0|0", json!({"x": 1}));
    store.create(&mut obj).await.unwrap();
    let add = as_json(&next_payload(&mut rx).await.payload);
    assert_eq!(add["method"], "add");
    assert_eq!(add["v"], 1);

    obj.set("x", json!(7));
    store.modify(&mut obj).await.unwrap();
    let modified = as_json(&next_payload(&mut rx).await.payload);
    assert_eq!(modified["method"], "mod");
    assert_eq!(modified["diff"], json!({"x": 7}));

    store.delete(&obj).await.unwrap();
    let rem = as_json(&next_payload(&mut rx).await.payload);
    assert_eq!(rem["method"], "rem");

    let loaded = Loader::load_by_chunks(&store, &[chunk("m:0|0")]).await.unwrap();
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn doc_store_create_conflicts_on_duplicate_id() {
    let fabric = TestFabric::new();
    let store = doc_store(&fabric);
    let id = ObjectId::parse("abcdefgh12345678").unwrap();

    let mut first = object_in("m:0|0", json!({}));
    first.set_id(id.clone()).unwrap();
    store.create(&mut first).await.unwrap();

    let mut rx = observe(&fabric, &["m:0|0"]);
    let mut dup = object_in("m:0|0", json!({}));
    dup.set_id(id).unwrap();
    let err = store.create(&mut dup).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(StoreError::Conflict { .. })));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn doc_store_cross_chunk_modify() {
    let fabric = TestFabric::new();
    let store = doc_store(&fabric);
    let mut obj = object_in("m:0|0", json!({"x": 1}));
    store.create(&mut obj).await.unwrap();

    let mut rx_src = observe(&fabric, &["m:0|0"]);
    let mut rx_dst = observe(&fabric, &["m:1|0"]);

    obj.set_chunk(chunk("m:1|0"));
    store.modify(&mut obj).await.unwrap();

    let modified = as_json(&next_payload(&mut rx_src).await.payload);
    assert_eq!(modified["nsKey"], "m:1|0");

    match decode_line(&next_payload(&mut rx_dst).await.payload).unwrap() {
        DeliveryLine::From { chunk: from, .. } => assert_eq!(from, chunk("m:0|0")),
        other => panic!("expected headered add, got {other:?}"),
    }

    // The record is findable under its new chunk only.
    assert!(Loader::load_by_chunks(&store, &[chunk("m:0|0")]).await.unwrap().is_empty());
    assert_eq!(
        Loader::load_by_chunks(&store, &[chunk("m:1|0")]).await.unwrap().len(),
        1
    );
}
