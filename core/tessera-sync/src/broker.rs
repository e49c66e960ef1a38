//! In-process pub/sub substrate.
//!
//! Chunk keys double as topics. Each session owns one subscriber identity;
//! the broker keeps the `topic → subscribers` and `subscriber → topics` maps
//! and fans every publish out to per-subscriber delivery channels.
//!
//! Ordering: all mutations and publishes run under one registry lock, so the
//! publications on a given topic reach every subscriber in publish order,
//! and a `subscribe` that has returned is guaranteed to receive every later
//! publish on that topic. There is no cross-topic guarantee.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tessera_types::{ChunkKey, SessionId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One fanned-out publication.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub topic: ChunkKey,
    pub payload: Vec<u8>,
}

struct Subscriber {
    topics: HashSet<ChunkKey>,
    tx: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct BrokerInner {
    topics: HashMap<ChunkKey, HashSet<SessionId>>,
    subscribers: HashMap<SessionId, Subscriber>,
}

impl BrokerInner {
    fn drop_subscriber(&mut self, id: &SessionId) {
        if let Some(sub) = self.subscribers.remove(id) {
            for topic in &sub.topics {
                if let Some(members) = self.topics.get_mut(topic) {
                    members.remove(id);
                    if members.is_empty() {
                        self.topics.remove(topic);
                    }
                }
            }
        }
    }
}

/// Shared pub/sub registry. Cheap to clone.
#[derive(Clone, Default)]
pub struct Broker {
    inner: Arc<Mutex<BrokerInner>>,
}

impl Broker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber identity and returns its delivery stream.
    /// Registering an id again replaces the previous stream.
    pub fn add_subscriber(&self, id: SessionId) -> mpsc::UnboundedReceiver<Delivery> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().expect("broker lock poisoned");
        inner.drop_subscriber(&id);
        inner.subscribers.insert(
            id,
            Subscriber {
                topics: HashSet::new(),
                tx,
            },
        );
        rx
    }

    /// Unregisters a subscriber, closing its delivery stream and releasing
    /// its topic entries.
    pub fn remove_subscriber(&self, id: &SessionId) {
        self.inner
            .lock()
            .expect("broker lock poisoned")
            .drop_subscriber(id);
    }

    /// Adds the subscriber to the given topics. Effective the moment this
    /// returns: later publishes on those topics reach the delivery stream.
    pub fn subscribe(&self, id: &SessionId, topics: &[ChunkKey]) {
        let mut inner = self.inner.lock().expect("broker lock poisoned");
        let Some(sub) = inner.subscribers.get_mut(id) else {
            warn!(session = %id, "subscribe from unknown subscriber");
            return;
        };
        for topic in topics {
            sub.topics.insert(topic.clone());
        }
        for topic in topics {
            inner.topics.entry(topic.clone()).or_default().insert(*id);
        }
    }

    /// Removes the subscriber from the given topics.
    pub fn unsubscribe(&self, id: &SessionId, topics: &[ChunkKey]) {
        let mut inner = self.inner.lock().expect("broker lock poisoned");
        if let Some(sub) = inner.subscribers.get_mut(id) {
            for topic in topics {
                sub.topics.remove(topic);
            }
        }
        for topic in topics {
            if let Some(members) = inner.topics.get_mut(topic) {
                members.remove(id);
                if members.is_empty() {
                    inner.topics.remove(topic);
                }
            }
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .expect("broker lock poisoned")
            .subscribers
            .len()
    }
}

impl tessera_store::EventSink for Broker {
    fn publish(&self, topic: &ChunkKey, payload: &[u8]) {
        let mut inner = self.inner.lock().expect("broker lock poisoned");
        let Some(members) = inner.topics.get(topic) else {
            return;
        };

        let mut stale = Vec::new();
        for id in members {
            let Some(sub) = inner.subscribers.get(id) else {
                continue;
            };
            let delivery = Delivery {
                topic: topic.clone(),
                payload: payload.to_vec(),
            };
            if sub.tx.send(delivery).is_err() {
                // Delivery stream dropped without unsubscribing.
                stale.push(*id);
            }
        }

        for id in stale {
            debug!(session = %id, "dropping subscriber with closed delivery stream");
            inner.drop_subscriber(&id);
        }
    }
}
