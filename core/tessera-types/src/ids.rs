//! Identifier types used throughout the Tessera core.

use crate::Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

/// Characters an [`ObjectId`] may contain. The key-value storage layout uses
/// `:` to join type keys and ids, so the alphabet must never include it.
pub const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of every [`ObjectId`], in characters.
pub const ID_LEN: usize = 16;

/// Unique identifier for a synchronized object.
///
/// Sixteen alphanumeric characters, globally unique per object. Assigned by
/// the mutator at create time when absent, and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId([u8; ID_LEN]);

impl ObjectId {
    /// Draws a fresh random id from the process-wide generator.
    #[must_use]
    pub fn random() -> Self {
        Self::random_from(&mut rand::rng())
    }

    /// Draws a fresh random id from the supplied generator. Used by [`IdGen`]
    /// and by tests that need reproducible ids.
    pub fn random_from<R: Rng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; ID_LEN];
        for b in &mut bytes {
            *b = ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())];
        }
        Self(bytes)
    }

    /// Parses an id, validating length and alphabet.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let raw = s.as_bytes();
        if raw.len() != ID_LEN || !raw.iter().all(|b| ID_ALPHABET.contains(b)) {
            return Err(Error::InvalidObjectId(s.to_string()));
        }
        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(raw);
        Ok(Self(bytes))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // The alphabet is pure ASCII, so the bytes are always valid UTF-8.
        std::str::from_utf8(&self.0).expect("object id bytes are ASCII")
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.as_str().to_string()
    }
}

/// A source of object ids.
///
/// The default source draws from the thread-local RNG. Tests inject a seeded
/// source so created objects get predictable ids.
pub struct IdGen {
    rng: Option<Mutex<StdRng>>,
}

impl IdGen {
    /// An id source backed by the process RNG.
    #[must_use]
    pub fn system() -> Self {
        Self { rng: None }
    }

    /// A deterministic id source. Two sources built from the same seed yield
    /// the same id sequence.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Draws the next id.
    pub fn next_id(&self) -> ObjectId {
        match &self.rng {
            Some(rng) => ObjectId::random_from(&mut *rng.lock().expect("id rng poisoned")),
            None => ObjectId::random(),
        }
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for IdGen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGen")
            .field("seeded", &self.rng.is_some())
            .finish()
    }
}

/// Unique identifier for a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a session ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
