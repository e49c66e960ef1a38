//! The object contract.

use crate::{Record, Result};
use serde_json::Value;
use tessera_types::{ChunkKey, ObjectId};

/// A versioned entity that the sync pipeline can persist and diff to clients.
///
/// An object carries its full current `state` plus a staged `diff` of
/// field-level changes that have not been applied yet. [`resolve`] applies
/// the diff, bumps the version, and yields the diff so the mutator can
/// publish it. The staged diff is also what makes cross-chunk moves
/// two-phased: [`sub_key`] reports the post-diff chunk while
/// [`prev_sub_key`] reports the chunk clients currently believe the object
/// is in.
///
/// The intended create-path usage is: build, [`boxed_clone`], [`init`] (so
/// the next resolve emits full state), hand off to the pipeline.
///
/// [`resolve`]: Object::resolve
/// [`sub_key`]: Object::sub_key
/// [`prev_sub_key`]: Object::prev_sub_key
/// [`boxed_clone`]: Object::boxed_clone
/// [`init`]: Object::init
pub trait Object: Send + Sync {
    /// Stable type tag, e.g. `"c:h"`. Selects the container factory during
    /// deserialization and never contains `:`-separated ids.
    fn type_key(&self) -> &str;

    /// The object's id, if one has been assigned.
    fn id(&self) -> Option<&ObjectId>;

    /// Assigns the id. Ids are immutable: assigning a different id to an
    /// object that already has one is an error.
    fn set_id(&mut self, id: ObjectId) -> Result<()>;

    /// Monotonically increasing version, incremented exactly once per
    /// [`resolve`](Object::resolve).
    fn version(&self) -> u64;

    /// The chunk the object belongs to once the staged diff applies.
    fn sub_key(&self) -> ChunkKey;

    /// The chunk the object belonged to before the staged diff. Equals
    /// [`sub_key`](Object::sub_key) when no chunk move is pending.
    fn prev_sub_key(&self) -> ChunkKey;

    /// Stages a move into `chunk`, effective at the next resolve.
    fn set_chunk(&mut self, chunk: ChunkKey);

    /// Full present field values.
    fn state(&self) -> Value;

    /// True iff the staged diff is non-empty.
    fn changed(&self) -> bool;

    /// Applies the staged diff to the state, increments the version,
    /// collapses the pending chunk move, and returns the applied diff.
    fn resolve(&mut self) -> Value;

    /// Stages every field of the current state, so the next resolve emits
    /// full state.
    fn init(&mut self);

    /// An independent copy; mutating the copy never affects the source.
    fn boxed_clone(&self) -> Box<dyn Object>;

    /// The persisted form of this object. Fails if no id is assigned.
    fn to_record(&self) -> Result<Record>;

    /// Hydrates this container from a persisted record. The record's type
    /// tag must match the container's.
    fn load_record(&mut self, record: Record) -> Result<()>;
}
