//! Chunk subscription keys.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies a group of objects to which clients subscribe collectively,
/// e.g. `"000a:8|-7"`. Doubles as the pub/sub topic the group's updates are
/// published on.
///
/// Keys must not contain `{` — the broker line codec splits a delivery at the
/// first `{` to separate an optional routing header from the JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChunkKey(String);

impl ChunkKey {
    /// Wraps a key, validating it is non-empty and codec-safe.
    pub fn parse(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        if s.is_empty() || s.contains('{') {
            return Err(Error::InvalidChunkKey(s));
        }
        Ok(Self(s))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChunkKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ChunkKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChunkKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ChunkKey> for String {
    fn from(key: ChunkKey) -> Self {
        key.0
    }
}
