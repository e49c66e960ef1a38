//! Synchronization pipeline for Tessera.
//!
//! Authoritative writers mutate versioned objects through a [`Mutator`],
//! which persists each change and publishes the matching client frames as
//! one transaction. Client sessions subscribe to chunk topics on the
//! [`Broker`], receive a snapshot through a [`Loader`], then stream
//! incremental updates — including cross-chunk moves, where the
//! `from <chunk>` line header guarantees each subscriber exactly one
//! visible event per move.
//!
//! # Components
//!
//! - **Protocol**: wire frames and the broker line codec
//! - **Broker**: in-process topic pub/sub with per-session fan-out
//! - **Mutator / Loader**: write and read adapters over the storage traits
//! - **Session**: the per-client task trio (reader, delivery, main loop)
//! - **SessionPool**: registry + best-effort broadcast
//!
//! # Delivery model
//!
//! At-least-once: per-topic order is preserved, cross-topic order is not,
//! and clients reconcile with per-object versions.

pub mod broker;
mod docstore;
mod error;
pub mod hooks;
mod loader;
mod mutator;
pub mod pool;
pub mod protocol;
pub mod session;
pub mod socket;

pub use broker::{Broker, Delivery};
pub use docstore::DocStore;
pub use error::{SyncError, SyncResult};
pub use hooks::{NoopHooks, SessionHooks};
pub use loader::{hydrate_records, Loader};
pub use mutator::{KvStore, Mutator};
pub use pool::SessionPool;
pub use protocol::{
    AddMessage, ClientMessage, CustomMessage, DeliveryLine, ModMessage, RemMessage,
    ServerMessage, UpdateSubscriptionMessage,
};
pub use session::{
    Session, SessionConfig, SessionContext, SessionHandle, DEFAULT_EGRESS_BUFFER,
    DEFAULT_PONG_TIMEOUT, DEFAULT_WRITE_TIMEOUT,
};
pub use socket::{SocketReader, SocketWriter};
