//! Storage backend traits for Tessera.
//!
//! The sync pipeline never talks to a concrete database; it talks to one of
//! two backend families defined here:
//!
//! - [`KvBackend`] — a key-value store with per-chunk membership sets and an
//!   atomic [`Batch`] that can carry publishes, so "persist + publish" commits
//!   as one transaction (the MULTI/EXEC shape).
//! - [`DocumentBackend`] — a document store queryable by the record's chunk
//!   field. Document stores cannot fold publishes into the write, so their
//!   adapter publishes after the persist succeeds.
//!
//! Publishes reach the pub/sub substrate through the [`EventSink`] seam.
//! [`MemoryKv`] and [`MemoryDocs`] implement the traits for tests and
//! single-process deployments.

mod document;
mod error;
mod kv;
mod memory;
mod sink;

pub use document::DocumentBackend;
pub use error::{StoreError, StoreResult};
pub use kv::{Batch, KvBackend, Op};
pub use memory::{MemoryDocs, MemoryKv};
pub use sink::{EventSink, NullSink};
