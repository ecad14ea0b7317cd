//! Keyed fan-out of events to channel-backed subscribers.
//!
//! Used for both file-change listeners (keyed by resource) and refresh
//! notifications (keyed by chart). A subscriber either listens to one key or
//! to every key. Subscribers whose receiver was dropped are pruned on the
//! next publish.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

pub type SubscriberId = u64;

struct Registry<K, E> {
    next_id: SubscriberId,
    keyed: HashMap<K, HashMap<SubscriberId, UnboundedSender<E>>>,
    global: HashMap<SubscriberId, UnboundedSender<E>>,
}

impl<K: Eq + Hash, E> Registry<K, E> {
    fn allocate_id(&mut self) -> SubscriberId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn remove(&mut self, key: Option<&K>, id: SubscriberId) -> bool {
        match key {
            Some(key) => {
                let Some(subscribers) = self.keyed.get_mut(key) else {
                    return false;
                };
                let removed = subscribers.remove(&id).is_some();
                if subscribers.is_empty() {
                    self.keyed.remove(key);
                }
                removed
            }
            None => self.global.remove(&id).is_some(),
        }
    }
}

pub struct Broadcaster<K, E> {
    registry: Arc<Mutex<Registry<K, E>>>,
}

impl<K, E> Clone for Broadcaster<K, E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<K, E> Default for Broadcaster<K, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, E> Broadcaster<K, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                keyed: HashMap::new(),
                global: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry<K, E>> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Listen to events published under `key`.
    pub fn subscribe(&self, key: K) -> Subscription<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate_id();
            registry.keyed.entry(key.clone()).or_default().insert(id, tx);
            id
        };
        self.subscription(Some(key), id, rx)
    }

    /// Listen to events published under any key.
    pub fn subscribe_all(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate_id();
            registry.global.insert(id, tx);
            id
        };
        self.subscription(None, id, rx)
    }

    fn subscription(&self, key: Option<K>, id: SubscriberId, rx: UnboundedReceiver<E>) -> Subscription<E> {
        let registry = Arc::downgrade(&self.registry);
        Subscription {
            id,
            receiver: rx,
            detach: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .remove(key.as_ref(), id);
                }
            })),
        }
    }

    /// Deliver `event` to subscribers of `key` and to global subscribers.
    /// Returns the number of subscribers reached.
    pub fn publish(&self, key: &K, event: E) -> usize {
        let mut registry = self.lock();
        let mut delivered = 0;

        if let Some(subscribers) = registry.keyed.get_mut(key) {
            subscribers.retain(|_, tx| {
                let ok = tx.send(event.clone()).is_ok();
                delivered += usize::from(ok);
                ok
            });
            if subscribers.is_empty() {
                registry.keyed.remove(key);
            }
        }

        registry.global.retain(|_, tx| {
            let ok = tx.send(event.clone()).is_ok();
            delivered += usize::from(ok);
            ok
        });

        delivered
    }

    pub fn subscriber_count(&self, key: &K) -> usize {
        self.lock().keyed.get(key).map_or(0, HashMap::len)
    }

    pub fn global_subscriber_count(&self) -> usize {
        self.lock().global.len()
    }
}

/// Receiving end of a subscription.
///
/// `unsubscribe` is idempotent. Dropping the subscription also stops
/// delivery (the sender is pruned on the next publish).
pub struct Subscription<E> {
    id: SubscriberId,
    receiver: UnboundedReceiver<E>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl<E> Subscription<E> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<E> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.detach.is_some()
    }
}

impl<E> std::fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}
