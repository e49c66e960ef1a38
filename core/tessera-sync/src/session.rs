//! Per-client session runtime.
//!
//! A session is three cooperating tasks around two queues:
//!
//! - **Reader** pulls frames off the socket, decodes them, and feeds the
//!   ingress queue. Decode failures are logged and skipped. Only this task
//!   closes the ingress queue (by dropping its only sender).
//! - **Delivery** funnels broker deliveries onto the egress queue, applying
//!   the `from <chunk>` suppression against the subscription set. It never
//!   closes the egress queue.
//! - **Main loop** owns the socket write half: it drains the egress queue,
//!   pings on a timer, and dispatches ingress messages — the subscription
//!   protocol runs here, so the subscription set has a single writer.
//!
//! Subscription ordering: the broker subscribe is effected before the
//! snapshot loads, and the snapshot is written directly to the socket from
//! inside the main loop while racing live updates queue behind it. Clients
//! therefore see `snapshot; then live updates`, never a live update for an
//! object whose snapshot arrives later.
//!
//! Shutdown may be triggered by the reader (socket closed), the main loop
//! (write error, missed ping deadline, closed queue), or [`close`]
//! (SessionHandle::close). Whichever fires first, the main loop exits,
//! unregisters from the broker (ending the delivery task), and
//! [`Session::wait`] reaps the rest within bounded time.

use crate::broker::{Broker, Delivery};
use crate::hooks::SessionHooks;
use crate::protocol::{
    self, AddMessage, ClientMessage, DeliveryLine, ServerMessage, UpdateSubscriptionMessage,
};
use crate::socket::{SocketReader, SocketWriter};
use crate::{Loader, SyncError, SyncResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tessera_types::{ChunkKey, SessionId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How long a pong may take before the connection is considered dead.
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a socket write may take before the session terminates.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Egress queue depth per session.
pub const DEFAULT_EGRESS_BUFFER: usize = 64;

/// Tunables for a session's timers and buffers.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub pong_timeout: Duration,
    pub write_timeout: Duration,
    pub egress_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            egress_buffer: DEFAULT_EGRESS_BUFFER,
        }
    }
}

impl SessionConfig {
    /// Pings must come faster than the pong timeout.
    fn ping_interval(&self) -> Duration {
        self.pong_timeout * 9 / 10
    }
}

/// Everything a session borrows from its server.
pub struct SessionContext {
    pub broker: Broker,
    pub loader: Arc<dyn Loader>,
    pub hooks: Arc<dyn SessionHooks>,
    pub config: SessionConfig,
}

/// A cheap, cloneable reference to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    egress: mpsc::Sender<Vec<u8>>,
    quit: mpsc::Sender<()>,
    closed: Arc<AtomicBool>,
}

impl SessionHandle {
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Enqueues bytes for delivery to the client. Safe for concurrent
    /// callers; suspends while the egress queue is full.
    pub async fn send(&self, payload: Vec<u8>) -> SyncResult<()> {
        self.egress
            .send(payload)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Non-blocking enqueue. Returns false when the queue is full or the
    /// session is gone — the broadcast path drops rather than waits.
    pub fn try_send(&self, payload: Vec<u8>) -> bool {
        self.egress.try_send(payload).is_ok()
    }

    /// Requests teardown. Safe for concurrent callers; only the first call
    /// signals the session.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.quit.try_send(());
        }
    }

    /// True once teardown has been requested through this handle family.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A running client session.
pub struct Session {
    id: SessionId,
    handle: SessionHandle,
    broker: Broker,
    loader: Arc<dyn Loader>,
    main_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
    delivery_task: JoinHandle<()>,
}

impl Session {
    /// Spawns the session task trio over the given socket halves.
    pub fn spawn(
        ctx: SessionContext,
        writer: Box<dyn SocketWriter>,
        reader: Box<dyn SocketReader>,
    ) -> Self {
        let id = SessionId::new();
        let (egress_tx, egress_rx) = mpsc::channel(ctx.config.egress_buffer);
        let (ingress_tx, ingress_rx) = mpsc::channel(ctx.config.egress_buffer);
        let (quit_tx, quit_rx) = mpsc::channel(1);
        let subscriptions = Arc::new(RwLock::new(HashSet::new()));
        let deliveries = ctx.broker.add_subscriber(id);

        let handle = SessionHandle {
            id,
            egress: egress_tx.clone(),
            quit: quit_tx,
            closed: Arc::new(AtomicBool::new(false)),
        };

        let reader_task = tokio::spawn(run_reader(id, reader, ingress_tx));
        let delivery_task = tokio::spawn(run_delivery(
            id,
            deliveries,
            subscriptions.clone(),
            egress_tx,
        ));
        let main_task = tokio::spawn(
            MainLoop {
                id,
                writer,
                egress_rx,
                ingress_rx,
                quit_rx,
                subscriptions,
                broker: ctx.broker.clone(),
                loader: ctx.loader.clone(),
                hooks: ctx.hooks,
                handle: handle.clone(),
                config: ctx.config,
            }
            .run(),
        );

        info!(session = %id, "session started");
        Self {
            id,
            handle,
            broker: ctx.broker,
            loader: ctx.loader,
            main_task,
            reader_task,
            delivery_task,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// A handle for the pool, hooks, and external senders.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Requests teardown. Idempotent.
    pub fn close(&self) {
        self.handle.close();
    }

    /// The once-per-session shutdown barrier: resolves when every task has
    /// exited and the session's loader is closed.
    pub async fn wait(self) {
        let _ = self.main_task.await;

        // The reader may still be parked on a healthy socket (e.g. the main
        // loop died on a write error); dropping its half closes the
        // connection.
        self.reader_task.abort();
        let _ = self.reader_task.await;

        // Normally done by the main loop on exit; repeated here so the
        // delivery task ends even if the main loop aborted.
        self.broker.remove_subscriber(&self.id);
        let _ = self.delivery_task.await;

        if let Err(err) = self.loader.close().await {
            warn!(session = %self.id, %err, "failed to close session loader");
        }
        info!(session = %self.id, "session closed");
    }
}

// ── Task 1: socket reader ────────────────────────────────────────

async fn run_reader(
    id: SessionId,
    mut socket: Box<dyn SocketReader>,
    ingress: mpsc::Sender<ClientMessage>,
) {
    while let Some(bytes) = socket.recv_text().await {
        match protocol::decode_client(&bytes) {
            Ok(msg) => {
                if ingress.send(msg).await.is_err() {
                    break;
                }
            }
            Err(err) => warn!(session = %id, %err, "skipping undecodable client frame"),
        }
    }
    debug!(session = %id, "socket reader finished");
    // The only ingress sender drops here, closing the queue for the main
    // loop.
}

// ── Task 2: broker delivery ──────────────────────────────────────

async fn run_delivery(
    id: SessionId,
    mut deliveries: mpsc::UnboundedReceiver<Delivery>,
    subscriptions: Arc<RwLock<HashSet<ChunkKey>>>,
    egress: mpsc::Sender<Vec<u8>>,
) {
    while let Some(delivery) = deliveries.recv().await {
        let payload = match protocol::decode_line(&delivery.payload) {
            Ok(DeliveryLine::Plain(payload)) => payload,
            Ok(DeliveryLine::From { chunk, payload }) => {
                let suppressed = subscriptions
                    .read()
                    .expect("subscription lock poisoned")
                    .contains(&chunk);
                if suppressed {
                    // Already subscribed to the source chunk: this session
                    // saw the move as a mod, the add would be a duplicate.
                    continue;
                }
                payload
            }
            Err(err) => {
                warn!(session = %id, %err, "dropping malformed broker delivery");
                continue;
            }
        };
        if egress.send(payload).await.is_err() {
            break;
        }
    }
    debug!(session = %id, "broker delivery finished");
}

// ── Task 3: main loop (control + egress) ─────────────────────────

struct MainLoop {
    id: SessionId,
    writer: Box<dyn SocketWriter>,
    egress_rx: mpsc::Receiver<Vec<u8>>,
    ingress_rx: mpsc::Receiver<ClientMessage>,
    quit_rx: mpsc::Receiver<()>,
    subscriptions: Arc<RwLock<HashSet<ChunkKey>>>,
    broker: Broker,
    loader: Arc<dyn Loader>,
    hooks: Arc<dyn SessionHooks>,
    handle: SessionHandle,
    config: SessionConfig,
}

impl MainLoop {
    async fn run(mut self) {
        let period = self.config.ping_interval();
        let mut ping = interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe = self.egress_rx.recv() => match maybe {
                    Some(payload) => {
                        if let Err(err) = self.write_text(payload).await {
                            warn!(session = %self.id, %err, "egress write failed");
                            break;
                        }
                    }
                    None => {
                        debug!(session = %self.id, "egress queue closed");
                        break;
                    }
                },
                _ = ping.tick() => {
                    if let Err(err) = self.send_ping().await {
                        warn!(session = %self.id, %err, "ping failed");
                        break;
                    }
                },
                maybe = self.ingress_rx.recv() => match maybe {
                    Some(msg) => {
                        if let Err(err) = self.dispatch(msg).await {
                            if matches!(err, SyncError::Socket(_)) {
                                warn!(session = %self.id, %err, "socket failure in dispatch");
                                break;
                            }
                            // Loader and codec problems are logged; the
                            // session keeps running.
                            warn!(session = %self.id, %err, "error handling client message");
                        }
                    }
                    None => {
                        debug!(session = %self.id, "ingress queue closed");
                        break;
                    }
                },
                _ = self.quit_rx.recv() => break,
            }
        }

        self.broker.remove_subscriber(&self.id);
    }

    async fn write_text(&mut self, payload: Vec<u8>) -> SyncResult<()> {
        match timeout(self.config.write_timeout, self.writer.send_text(payload)).await {
            Ok(res) => res,
            Err(_) => Err(SyncError::Socket("write deadline exceeded".into())),
        }
    }

    async fn send_ping(&mut self) -> SyncResult<()> {
        match timeout(self.config.write_timeout, self.writer.send_ping()).await {
            Ok(res) => res,
            Err(_) => Err(SyncError::Socket("ping deadline exceeded".into())),
        }
    }

    async fn dispatch(&mut self, msg: ClientMessage) -> SyncResult<()> {
        match msg {
            ClientMessage::UpdateSubscription(update) => self.update_subscription(update).await,
            ClientMessage::Custom(custom) => {
                self.hooks
                    .on_message(&self.handle, &custom.method, &custom.data)
                    .await;
                Ok(())
            }
        }
    }

    /// The subscription protocol. Runs only here, so the subscription set
    /// has a single writer and the handling of later client messages queues
    /// behind the snapshot — a client cannot miss an update between its
    /// snapshot and the subscription taking effect.
    async fn update_subscription(&mut self, msg: UpdateSubscriptionMessage) -> SyncResult<()> {
        {
            let mut subs = self
                .subscriptions
                .write()
                .expect("subscription lock poisoned");
            for key in &msg.remove {
                subs.remove(key);
            }
            for key in &msg.add {
                subs.insert(key.clone());
            }
        }

        if !msg.remove.is_empty() {
            self.broker.unsubscribe(&self.id, &msg.remove);
        }
        if msg.add.is_empty() {
            return Ok(());
        }

        // Subscribe before the snapshot: mutations racing with this call are
        // published on the chunk and reach the egress queue, which drains
        // after the snapshot frames below.
        self.broker.subscribe(&self.id, &msg.add);

        let objects = self.loader.load_by_chunks(&msg.add).await?;
        for obj in &objects {
            let Some(object_id) = obj.id() else {
                warn!(session = %self.id, t = obj.type_key(), "loaded object has no id, skipping");
                continue;
            };
            let frame = ServerMessage::Add(AddMessage {
                state: obj.state(),
                id: object_id.clone(),
                s_key: obj.sub_key(),
                ps_key: None,
                v: obj.version(),
                t: obj.type_key().to_string(),
            });
            // Written directly: this call stack is already inside the egress
            // task, and sending to our own queue could fill it and deadlock.
            self.write_text(frame.encode()?).await?;
        }

        self.hooks.on_subscribe(&self.handle, &msg.add, &objects).await;
        Ok(())
    }
}
