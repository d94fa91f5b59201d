//! In-process topic bus used to tell interested components that some shared
//! client state changed.
//!
//! One Tokio broadcast channel per topic. Publishers never block; receivers
//! that fall behind observe `RecvError::Lagged` and are expected to re-read
//! the state they care about instead of replaying every event.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

const DEFAULT_CAPACITY: usize = 100;

/// Topic-keyed broadcast channels.
///
/// - Lazily creates a channel per topic on first subscription
/// - Drops a topic once a publish finds no receivers left
#[derive(Clone)]
pub struct EventBus<T: Clone> {
    inner: Arc<RwLock<HashMap<String, broadcast::Sender<T>>>>,
    capacity: usize,
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to `topic`, creating it if necessary.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<T> {
        let mut map = self.inner.write().await;
        map.entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publishes `msg` to every subscriber of `topic` and returns how many
    /// receivers got it. Unknown topics are a no-op.
    pub async fn publish(&self, topic: &str, msg: T) -> usize {
        let mut map = self.inner.write().await;
        let Some(sender) = map.get(topic) else {
            return 0;
        };
        let delivered = sender.send(msg).unwrap_or(0);
        if sender.receiver_count() == 0 {
            tracing::debug!("Removing topic '{topic}' due to no subscribers.");
            map.remove(topic);
        }
        delivered
    }

    pub async fn has_topic(&self, topic: &str) -> bool {
        self.inner.read().await.contains_key(topic)
    }
}
