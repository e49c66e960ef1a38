//! The persisted object envelope.

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_types::{ChunkKey, ObjectId};

/// The form objects take in storage: type tag, id, current chunk, version,
/// and the full state. The `sub` field is what makes chunk-scoped queries
/// work in both backend families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub t: String,
    pub id: ObjectId,
    pub sub: ChunkKey,
    pub v: u64,
    pub state: Value,
}

/// Decodes only the type tag, so a loader can pick a container before
/// deserializing the full record.
#[derive(Deserialize)]
struct TypeProbe {
    t: String,
}

impl Record {
    /// Serializes the record to its stored byte form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserializes a record from its stored byte form.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reads just the type tag out of a stored record.
    pub fn probe_type(bytes: &[u8]) -> Result<String> {
        let probe: TypeProbe = serde_json::from_slice(bytes)?;
        Ok(probe.t)
    }

    /// The `type:id` member key used by the key-value chunk sets.
    #[must_use]
    pub fn member_key(&self) -> String {
        format!("{}:{}", self.t, self.id)
    }
}
