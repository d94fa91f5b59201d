//! Background tasks that keep a [`NotificationRelay`] current.
//!
//! Push delivery goes through `on_push`; the periodic safety-net refetch
//! calls the same `fetch_all` used on page load, so there is a single
//! reconciliation path.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::error::Result;
use crate::notification_relay::NotificationRelay;
use crate::push::{PushStream, PushTransport};

/// Pumps pushed notifications into the relay until shutdown or stream end.
pub fn spawn_listener(
    relay: NotificationRelay,
    mut stream: PushStream,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                next = stream.next() => match next {
                    Some(n) => {
                        relay.on_push(n).await;
                    }
                    None => {
                        tracing::info!("Push stream ended");
                        break;
                    }
                }
            }
        }
    })
}

/// Refetches the relay every `period`, starting one period from now.
pub fn spawn_poller(
    relay: NotificationRelay,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = period.max(Duration::from_millis(10));
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    // Errors are already logged and published by the relay.
                    let _ = relay.fetch_all().await;
                }
            }
        }
    })
}

pub struct RelayTasks {
    shutdown: watch::Sender<bool>,
    listener: JoinHandle<()>,
    poller: JoinHandle<()>,
}

impl RelayTasks {
    /// Stops both tasks and waits for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.listener.await;
        let _ = self.poller.await;
    }
}

/// Initial authoritative load, then push subscription plus periodic refetch.
///
/// A failed initial load is not fatal: the poller retries on its next tick.
pub async fn start(
    relay: &NotificationRelay,
    transport: &dyn PushTransport,
    period: Duration,
) -> Result<RelayTasks> {
    if let Err(err) = relay.fetch_all().await {
        tracing::warn!("Initial notification load failed, relying on poller: {err}");
    }

    let stream = transport.subscribe(relay.session().user_id()).await?;
    let (shutdown, rx) = watch::channel(false);
    let listener = spawn_listener(relay.clone(), stream, rx.clone());
    let poller = spawn_poller(relay.clone(), period, rx);

    Ok(RelayTasks {
        shutdown,
        listener,
        poller,
    })
}
