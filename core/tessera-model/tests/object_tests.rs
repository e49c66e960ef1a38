use serde_json::{json, Map, Value};
use tessera_model::{Error, JsonObject, Object, ObjectRegistry, Record};
use tessera_types::{ChunkKey, ObjectId};

fn chunk(s: &str) -> ChunkKey {
    ChunkKey::parse(s).unwrap()
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn sample() -> JsonObject {
    JsonObject::with_state("c:h", chunk("m:0|0"), fields(json!({"x": 1, "y": 2})))
}

// ── Diff / resolve ───────────────────────────────────────────────

#[test]
fn fresh_object_is_unchanged() {
    let obj = sample();
    assert!(!obj.changed());
    assert_eq!(obj.version(), 0);
    assert_eq!(obj.sub_key(), obj.prev_sub_key());
}

#[test]
fn set_stages_without_applying() {
    let mut obj = sample();
    obj.set("x", json!(5));
    assert!(obj.changed());
    assert_eq!(obj.state(), json!({"x": 1, "y": 2}));
}

#[test]
fn resolve_applies_diff_and_bumps_version() {
    let mut obj = sample();
    obj.set("x", json!(5));
    obj.set("name", json!("ada"));

    let diff = obj.resolve();

    assert_eq!(diff, json!({"x": 5, "name": "ada"}));
    assert_eq!(obj.state(), json!({"x": 5, "y": 2, "name": "ada"}));
    assert_eq!(obj.version(), 1);
    assert!(!obj.changed());
}

#[test]
fn resolve_collapses_pending_chunk_move() {
    let mut obj = sample();
    obj.set_chunk(chunk("m:1|0"));
    assert_eq!(obj.prev_sub_key(), chunk("m:0|0"));
    assert_eq!(obj.sub_key(), chunk("m:1|0"));
    assert!(obj.changed());

    obj.resolve();

    assert_eq!(obj.prev_sub_key(), chunk("m:1|0"));
    assert_eq!(obj.sub_key(), chunk("m:1|0"));
}

#[test]
fn set_chunk_back_to_current_cancels_move() {
    let mut obj = sample();
    obj.set_chunk(chunk("m:1|0"));
    obj.set_chunk(chunk("m:0|0"));
    assert!(!obj.changed());
    assert_eq!(obj.sub_key(), chunk("m:0|0"));
}

#[test]
fn init_stages_full_state() {
    let mut obj = sample();
    obj.init();
    assert!(obj.changed());
    let diff = obj.resolve();
    assert_eq!(diff, json!({"x": 1, "y": 2}));
}

// ── Copy ─────────────────────────────────────────────────────────

#[test]
fn copies_are_independent() {
    let obj = sample();
    let mut copy = obj.boxed_clone();
    copy.set_chunk(chunk("m:9|9"));
    copy.resolve();

    assert_eq!(obj.version(), 0);
    assert_eq!(obj.sub_key(), chunk("m:0|0"));
    assert_eq!(copy.version(), 1);
    assert_eq!(copy.sub_key(), chunk("m:9|9"));
}

// ── Ids ──────────────────────────────────────────────────────────

#[test]
fn id_is_immutable_once_set() {
    let mut obj = sample();
    let first = ObjectId::random();
    obj.set_id(first.clone()).unwrap();

    // Re-assigning the same id is a no-op.
    obj.set_id(first.clone()).unwrap();

    let err = obj.set_id(ObjectId::random()).unwrap_err();
    assert!(matches!(err, Error::IdImmutable { .. }));
    assert_eq!(obj.id(), Some(&first));
}

// ── Records ──────────────────────────────────────────────────────

#[test]
fn record_roundtrip() {
    let mut obj = sample();
    obj.set_id(ObjectId::random()).unwrap();
    obj.set("x", json!(7));
    obj.resolve();

    let record = obj.to_record().unwrap();
    let bytes = record.encode().unwrap();
    assert_eq!(Record::probe_type(&bytes).unwrap(), "c:h");

    let mut hydrated = JsonObject::empty("c:h");
    hydrated.load_record(Record::decode(&bytes).unwrap()).unwrap();

    assert_eq!(hydrated.id(), obj.id());
    assert_eq!(hydrated.version(), obj.version());
    assert_eq!(hydrated.state(), obj.state());
    assert_eq!(hydrated.sub_key(), obj.sub_key());
    assert!(!hydrated.changed());
}

#[test]
fn to_record_requires_id() {
    let obj = sample();
    assert!(matches!(obj.to_record(), Err(Error::MissingId)));
}

#[test]
fn record_carries_post_diff_chunk() {
    let mut obj = sample();
    obj.set_id(ObjectId::random()).unwrap();
    obj.set_chunk(chunk("m:1|0"));
    let record = obj.to_record().unwrap();
    assert_eq!(record.sub, chunk("m:1|0"));
}

#[test]
fn load_record_rejects_wrong_type() {
    let mut obj = sample();
    obj.set_id(ObjectId::random()).unwrap();
    let record = obj.to_record().unwrap();

    let mut container = JsonObject::empty("c:o");
    assert!(matches!(
        container.load_record(record),
        Err(Error::TypeMismatch { .. })
    ));
}

// ── Registry ─────────────────────────────────────────────────────

#[test]
fn registry_constructs_registered_types() {
    let mut registry = ObjectRegistry::new();
    registry.register_json("c:h");
    registry.register("c:o", || {
        Box::new(JsonObject::empty("c:o")) as Box<dyn Object>
    });

    assert!(registry.contains("c:h"));
    assert_eq!(registry.construct("c:h").unwrap().type_key(), "c:h");
    assert_eq!(registry.construct("c:o").unwrap().type_key(), "c:o");
    assert!(registry.construct("c:x").is_none());
}
