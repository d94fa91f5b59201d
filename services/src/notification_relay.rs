//! Session-scoped notification list fed by push delivery and authoritative
//! refetches.
//!
//! `id` is the only dedup key. Pushes prepend, [`NotificationRelay::fetch_all`]
//! replaces; the unread count is always derived from the current list.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use util::bus::EventBus;
use util::ws::topics::relay_state_topic;

use crate::backend::NotificationBackend;
use crate::error::Result;
use crate::model::{Notification, NotificationId};
use crate::session::Session;

/// Published on the relay topic whenever the list changes or a mutation fails.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Changed { unread: usize, total: usize },
    Error { message: String },
}

/// User-facing audio/visual cue for a newly arrived notification.
pub trait NotificationCue: Send + Sync {
    fn cue(&self, notification: &Notification);
}

/// Default cue: a log line.
pub struct LogCue;

impl NotificationCue for LogCue {
    fn cue(&self, notification: &Notification) {
        tracing::info!(id = %notification.id, "New notification: {}", notification.message);
    }
}

fn unread_in(items: &[Notification]) -> usize {
    items.iter().filter(|n| !n.read).count()
}

/// Newest first, first occurrence of each id wins.
fn sort_and_dedup(mut items: Vec<Notification>) -> Vec<Notification> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let mut seen = HashSet::new();
    items.retain(|n| seen.insert(n.id.clone()));
    items
}

#[derive(Clone)]
pub struct NotificationRelay {
    session: Session,
    backend: Arc<dyn NotificationBackend>,
    items: Arc<RwLock<Vec<Notification>>>,
    bus: EventBus<RelayEvent>,
    topic: String,
    cue: Arc<dyn NotificationCue>,
}

impl NotificationRelay {
    pub fn new(
        session: Session,
        backend: Arc<dyn NotificationBackend>,
        bus: EventBus<RelayEvent>,
    ) -> Self {
        let topic = relay_state_topic(session.user_id().as_str());
        Self {
            session,
            backend,
            items: Arc::new(RwLock::new(Vec::new())),
            bus,
            topic,
            cue: Arc::new(LogCue),
        }
    }

    pub fn with_cue(mut self, cue: Arc<dyn NotificationCue>) -> Self {
        self.cue = cue;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Receiver for [`RelayEvent`]s of this session.
    pub async fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.bus.subscribe(&self.topic).await
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.items.read().await.clone()
    }

    pub async fn unread_count(&self) -> usize {
        unread_in(&self.items.read().await)
    }

    async fn publish_changed(&self) {
        let (unread, total) = {
            let items = self.items.read().await;
            (unread_in(&items), items.len())
        };
        self.bus
            .publish(&self.topic, RelayEvent::Changed { unread, total })
            .await;
    }

    async fn publish_error(bus: &EventBus<RelayEvent>, topic: &str, message: String) {
        bus.publish(topic, RelayEvent::Error { message }).await;
    }

    /// Handles one pushed notification. Returns `false` when it was
    /// discarded (other user, or an id already in the list).
    pub async fn on_push(&self, mut notification: Notification) -> bool {
        match notification.user_id.as_ref() {
            None => {
                tracing::warn!(id = %notification.id, "Discarding push without a recipient");
                return false;
            }
            Some(target) if !self.session.is_target(Some(target)) => {
                tracing::debug!(id = %notification.id, "Discarding push addressed to another user");
                return false;
            }
            Some(_) => {}
        }

        {
            let mut items = self.items.write().await;
            if items.iter().any(|n| n.id == notification.id) {
                tracing::debug!(id = %notification.id, "Discarding duplicate push");
                return false;
            }
            notification.read = false;
            items.insert(0, notification.clone());
        }

        self.cue.cue(&notification);
        self.publish_changed().await;
        true
    }

    /// Replaces the list with the server's full set for the session user.
    /// On failure the current list is kept and the error is published.
    pub async fn fetch_all(&self) -> Result<()> {
        let fetched = match self
            .backend
            .fetch_notifications(self.session.user_id())
            .await
        {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!("Notification fetch failed: {err}");
                Self::publish_error(&self.bus, &self.topic, err.user_message()).await;
                return Err(err);
            }
        };

        let fresh = sort_and_dedup(fetched);
        tracing::debug!(count = fresh.len(), "Notifications refreshed");
        *self.items.write().await = fresh;
        self.publish_changed().await;
        Ok(())
    }

    fn spawn_mutation<F>(&self, what: &'static str, call: F) -> JoinHandle<Result<()>>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let bus = self.bus.clone();
        let topic = self.topic.clone();
        tokio::spawn(async move {
            let result = call.await;
            if let Err(err) = &result {
                tracing::warn!("{what} failed: {err}");
                Self::publish_error(&bus, &topic, err.user_message()).await;
            }
            result
        })
    }

    /// Flips `read` locally, then sends the mutation without waiting for it.
    /// The handle resolves with the server's answer.
    pub async fn mark_read(&self, id: &NotificationId) -> JoinHandle<Result<()>> {
        let changed = {
            let mut items = self.items.write().await;
            match items.iter_mut().find(|n| &n.id == id) {
                Some(n) if !n.read => {
                    n.read = true;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.publish_changed().await;
        }

        let backend = Arc::clone(&self.backend);
        let id = id.clone();
        self.spawn_mutation("mark_read", async move { backend.mark_read(&id).await })
    }

    pub async fn mark_all_read(&self) -> JoinHandle<Result<()>> {
        let changed = {
            let mut items = self.items.write().await;
            let mut changed = false;
            for n in items.iter_mut().filter(|n| !n.read) {
                n.read = true;
                changed = true;
            }
            changed
        };
        if changed {
            self.publish_changed().await;
        }

        let backend = Arc::clone(&self.backend);
        let user = self.session.user_id().clone();
        self.spawn_mutation("mark_all_read", async move { backend.mark_all_read(&user).await })
    }

    /// Deletes one notification; it leaves the list only after the server
    /// confirms.
    pub async fn delete(&self, id: &NotificationId) -> Result<()> {
        if let Err(err) = self.backend.delete(id).await {
            tracing::warn!(id = %id, "Notification delete failed: {err}");
            Self::publish_error(&self.bus, &self.topic, err.user_message()).await;
            return Err(err);
        }
        self.items.write().await.retain(|n| &n.id != id);
        self.publish_changed().await;
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<()> {
        if let Err(err) = self.backend.delete_all(self.session.user_id()).await {
            tracing::warn!("Bulk notification delete failed: {err}");
            Self::publish_error(&self.bus, &self.topic, err.user_message()).await;
            return Err(err);
        }
        self.items.write().await.clear();
        self.publish_changed().await;
        Ok(())
    }
}
