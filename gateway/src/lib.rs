//! WebSocket gateway for the Tessera sync fabric.
//!
//! Exposes two routes:
//! - `GET /ws` — upgrades to a WebSocket and runs a sync session over it
//!   (any origin accepted by default)
//! - `GET /api/v1/health` — build and liveness info
//!
//! The gateway owns the in-process substrate: one [`Broker`], one memory
//! key-value backend committing publishes through it, and a [`SessionPool`].
//! Simulation code embedding the gateway takes mutators from
//! [`GatewayState::mutator`]; each WebSocket session gets its own loader.

pub mod config;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Json, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_model::ObjectRegistry;
use tessera_store::{KvBackend, MemoryKv};
use tessera_sync::{
    Broker, KvStore, Loader, Session, SessionConfig, SessionContext, SessionHooks, SocketReader,
    SocketWriter, SyncError, SyncResult,
};
use tracing::{info, warn};

/// Shared gateway state: the in-process substrate plus session wiring.
pub struct GatewayState {
    broker: Broker,
    backend: Arc<dyn KvBackend>,
    registry: Arc<ObjectRegistry>,
    pool: tessera_sync::SessionPool,
    hooks: Arc<dyn SessionHooks>,
    session_config: SessionConfig,
}

impl GatewayState {
    /// Builds the substrate. The registry decides which object types the
    /// gateway can hydrate; the hooks receive connection and custom-message
    /// callbacks.
    pub fn new(
        registry: ObjectRegistry,
        hooks: Arc<dyn SessionHooks>,
        session_config: SessionConfig,
    ) -> Arc<Self> {
        let broker = Broker::new();
        let backend: Arc<dyn KvBackend> = Arc::new(MemoryKv::new(Arc::new(broker.clone())));
        Arc::new(Self {
            broker,
            backend,
            registry: Arc::new(registry),
            pool: tessera_sync::SessionPool::spawn(),
            hooks,
            session_config,
        })
    }

    /// The fabric's broker.
    #[must_use]
    pub fn broker(&self) -> Broker {
        self.broker.clone()
    }

    /// The session pool, for application broadcasts.
    #[must_use]
    pub fn pool(&self) -> tessera_sync::SessionPool {
        self.pool.clone()
    }

    /// A write-side adapter for simulation tasks. Take one per writer.
    #[must_use]
    pub fn mutator(&self) -> KvStore {
        KvStore::new(self.backend.clone(), self.registry.clone())
    }

    fn loader(&self) -> Arc<dyn Loader> {
        Arc::new(KvStore::new(self.backend.clone(), self.registry.clone()))
    }
}

/// Health route payload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.broker.subscriber_count(),
    })
}

async fn ws_handler(State(state): State<Arc<GatewayState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_session(state, socket))
}

/// Build the gateway router with the given state.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/v1/health", get(health_handler))
        .with_state(state)
}

/// Runs one client session over an upgraded socket, then cleans up.
async fn run_session(state: Arc<GatewayState>, socket: WebSocket) {
    let (sink, stream) = socket.split();

    let session = Session::spawn(
        SessionContext {
            broker: state.broker.clone(),
            loader: state.loader(),
            hooks: state.hooks.clone(),
            config: state.session_config.clone(),
        },
        Box::new(WsWriter { sink }),
        Box::new(WsReader { stream }),
    );

    state.hooks.on_connect(&session.handle()).await;
    if let Err(err) = state.pool.add(session.handle()).await {
        warn!(%err, "failed to register session with pool");
    }

    let id = session.id();
    session.wait().await;

    if let Err(err) = state.pool.remove(id).await {
        warn!(%err, "failed to remove session from pool");
    }
    info!(session = %id, "connection handler finished");
}

// ── Socket adapters ──────────────────────────────────────────────

struct WsWriter {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait::async_trait]
impl SocketWriter for WsWriter {
    async fn send_text(&mut self, payload: Vec<u8>) -> SyncResult<()> {
        let text = String::from_utf8(payload)
            .map_err(|_| SyncError::Socket("outbound frame is not UTF-8".into()))?;
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SyncError::Socket(e.to_string()))
    }

    async fn send_ping(&mut self) -> SyncResult<()> {
        self.sink
            .send(Message::Ping(Default::default()))
            .await
            .map_err(|e| SyncError::Socket(e.to_string()))
    }
}

struct WsReader {
    stream: SplitStream<WebSocket>,
}

#[async_trait::async_trait]
impl SocketReader for WsReader {
    async fn recv_text(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(text.as_str().as_bytes().to_vec()),
                Ok(Message::Close(_)) => return None,
                // Binary frames are not part of the protocol; control
                // frames are handled by the transport.
                Ok(_) => continue,
                Err(err) => {
                    warn!(%err, "websocket read error");
                    return None;
                }
            }
        }
    }
}
