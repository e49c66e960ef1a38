//! Session registry and broadcast.

use crate::session::SessionHandle;
use crate::{SyncError, SyncResult};
use std::collections::HashMap;
use tessera_types::SessionId;
use tokio::sync::mpsc;
use tracing::debug;

enum Command {
    Add(SessionHandle),
    Remove(SessionId),
    Broadcast(Vec<u8>),
}

/// A registry of live sessions owned by a single coordinator task.
///
/// Broadcasts use a non-blocking enqueue per session: a full egress queue
/// drops that session's copy instead of stalling the coordinator, so one
/// slow client never delays delivery to the others.
#[derive(Clone)]
pub struct SessionPool {
    commands: mpsc::Sender<Command>,
}

impl SessionPool {
    /// Starts the coordinator task.
    #[must_use]
    pub fn spawn() -> Self {
        let (commands, rx) = mpsc::channel(64);
        tokio::spawn(run_pool(rx));
        Self { commands }
    }

    /// Registers a session.
    pub async fn add(&self, handle: SessionHandle) -> SyncResult<()> {
        self.send(Command::Add(handle)).await
    }

    /// Unregisters a session, dropping the pool's egress handle to it.
    pub async fn remove(&self, id: SessionId) -> SyncResult<()> {
        self.send(Command::Remove(id)).await
    }

    /// Best-effort delivery of `payload` to every registered session,
    /// bypassing the subscription filter.
    pub async fn broadcast(&self, payload: Vec<u8>) -> SyncResult<()> {
        self.send(Command::Broadcast(payload)).await
    }

    async fn send(&self, command: Command) -> SyncResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }
}

async fn run_pool(mut rx: mpsc::Receiver<Command>) {
    let mut sessions: HashMap<SessionId, SessionHandle> = HashMap::new();
    while let Some(command) = rx.recv().await {
        match command {
            Command::Add(handle) => {
                sessions.insert(handle.id(), handle);
            }
            Command::Remove(id) => {
                // Dropping the handle releases the pool's egress sender; the
                // queue closes once the session's remaining senders go away.
                sessions.remove(&id);
            }
            Command::Broadcast(payload) => {
                for handle in sessions.values() {
                    if !handle.try_send(payload.clone()) {
                        debug!(session = %handle.id(), "egress queue full, dropping broadcast");
                    }
                }
            }
        }
    }
}
