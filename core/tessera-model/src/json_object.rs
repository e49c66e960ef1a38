//! Generic flat-field-map object container.

use crate::{Error, Object, Record, Result};
use serde_json::{Map, Value};
use tessera_types::{ChunkKey, ObjectId};

/// Placeholder chunk for freshly constructed empty containers. Replaced by
/// [`Object::load_record`] before the container is ever observed.
const UNLOADED_CHUNK: &str = "~";

/// An [`Object`] whose state is a flat JSON field map and whose staged diff
/// is a partial overlay of that map.
///
/// This is the container applications use when they have no typed schema,
/// and the container the test suites drive the pipeline with. Field writes
/// go to the diff; [`Object::resolve`] folds them into the state.
#[derive(Debug, Clone)]
pub struct JsonObject {
    type_key: String,
    id: Option<ObjectId>,
    sub: ChunkKey,
    next_sub: Option<ChunkKey>,
    version: u64,
    state: Map<String, Value>,
    diff: Map<String, Value>,
}

impl JsonObject {
    /// An object of the given type living in `chunk`, with empty state.
    pub fn new(type_key: impl Into<String>, chunk: ChunkKey) -> Self {
        Self {
            type_key: type_key.into(),
            id: None,
            sub: chunk,
            next_sub: None,
            version: 0,
            state: Map::new(),
            diff: Map::new(),
        }
    }

    /// An object with initial state already in place (not staged).
    pub fn with_state(
        type_key: impl Into<String>,
        chunk: ChunkKey,
        state: Map<String, Value>,
    ) -> Self {
        Self {
            state,
            ..Self::new(type_key, chunk)
        }
    }

    /// An empty container for registry factories; its chunk is a placeholder
    /// until a record is loaded into it.
    pub fn empty(type_key: impl Into<String>) -> Self {
        Self::new(
            type_key,
            ChunkKey::parse(UNLOADED_CHUNK).expect("placeholder chunk is valid"),
        )
    }

    /// Stages a field write. Visible in [`Object::state`] only after the
    /// next resolve.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.diff.insert(field.into(), value);
    }

    /// Reads a field of the current (pre-diff) state.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.state.get(field)
    }
}

impl Object for JsonObject {
    fn type_key(&self) -> &str {
        &self.type_key
    }

    fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: ObjectId) -> Result<()> {
        match &self.id {
            Some(existing) if *existing != id => Err(Error::IdImmutable {
                existing: existing.clone(),
                new: id,
            }),
            _ => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn sub_key(&self) -> ChunkKey {
        self.next_sub.clone().unwrap_or_else(|| self.sub.clone())
    }

    fn prev_sub_key(&self) -> ChunkKey {
        self.sub.clone()
    }

    fn set_chunk(&mut self, chunk: ChunkKey) {
        if chunk == self.sub {
            self.next_sub = None;
        } else {
            self.next_sub = Some(chunk);
        }
    }

    fn state(&self) -> Value {
        Value::Object(self.state.clone())
    }

    fn changed(&self) -> bool {
        !self.diff.is_empty() || self.next_sub.is_some()
    }

    fn resolve(&mut self) -> Value {
        let diff = std::mem::take(&mut self.diff);
        for (field, value) in &diff {
            self.state.insert(field.clone(), value.clone());
        }
        if let Some(next) = self.next_sub.take() {
            self.sub = next;
        }
        self.version += 1;
        Value::Object(diff)
    }

    fn init(&mut self) {
        self.diff = self.state.clone();
    }

    fn boxed_clone(&self) -> Box<dyn Object> {
        Box::new(self.clone())
    }

    fn to_record(&self) -> Result<Record> {
        let id = self.id.clone().ok_or(Error::MissingId)?;
        Ok(Record {
            t: self.type_key.clone(),
            id,
            sub: self.sub_key(),
            v: self.version,
            state: Value::Object(self.state.clone()),
        })
    }

    fn load_record(&mut self, record: Record) -> Result<()> {
        if record.t != self.type_key {
            return Err(Error::TypeMismatch {
                expected: self.type_key.clone(),
                got: record.t,
            });
        }
        let state = match record.state {
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidRecord(format!(
                    "state is not a JSON object: {other}"
                )))
            }
        };
        self.id = Some(record.id);
        self.sub = record.sub;
        self.next_sub = None;
        self.version = record.v;
        self.state = state;
        self.diff.clear();
        Ok(())
    }
}
