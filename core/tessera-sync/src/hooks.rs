//! Application callbacks for session events.

use crate::session::SessionHandle;
use async_trait::async_trait;
use tessera_model::Object;
use tessera_types::ChunkKey;

/// Custom behavior attached to every session.
///
/// A sync server implements this to handle application messages (any client
/// frame whose method the fabric does not recognize) and to react to
/// connections and subscription changes. Callbacks run on the session's main
/// loop; long work should move to its own task and reply through
/// [`SessionHandle::send`].
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// A client connected and its session is running.
    async fn on_connect(&self, session: &SessionHandle) {
        let _ = session;
    }

    /// A client frame with an unrecognized method. `data` is the raw frame.
    async fn on_message(&self, session: &SessionHandle, method: &str, data: &[u8]) {
        let _ = (session, method, data);
    }

    /// The session subscribed to `added` and sent the snapshot of `objects`.
    async fn on_subscribe(
        &self,
        session: &SessionHandle,
        added: &[ChunkKey],
        objects: &[Box<dyn Object>],
    ) {
        let _ = (session, added, objects);
    }
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

#[async_trait]
impl SessionHooks for NoopHooks {}
