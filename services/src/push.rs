//! Push delivery of notifications over a persistent WebSocket.
//!
//! The transport owns reconnection: [`WsPushTransport::subscribe`] hands back
//! a stream that survives dropped connections, and reports
//! `Disconnected → Connecting → Connected` on a watch channel.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use futures::SinkExt;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;
use util::ws::topics::{notifications_topic, notifications_topic_user};
use util::ws::{EventEnvelope, WsOut, is_keepalive};

use crate::error::{ClientError, Result};
use crate::model::{Notification, UserId};
use crate::normalize;

const NOTIFICATION_EVENTS: &[&str] = &["notification", "notification:new", "new_notification"];
const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

pub type PushStream = BoxStream<'static, Notification>;

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Stream of notifications pushed to `user`. Ends only when the
    /// transport is torn down.
    async fn subscribe(&self, user: &UserId) -> Result<PushStream>;
}

/// Decodes one text frame. Keep-alives, other events and malformed frames
/// yield `None`. A payload without a recipient inherits the user of the
/// per-user topic it was published on.
pub fn parse_frame(raw: &str) -> Option<Notification> {
    if is_keepalive(raw) {
        return None;
    }
    let value: Value = serde_json::from_str(raw).ok()?;
    match serde_json::from_value::<EventEnvelope<Value>>(value.clone()) {
        Ok(env) if NOTIFICATION_EVENTS.contains(&env.event.as_str()) => {
            let mut n = normalize::notification(&env.payload)?;
            if n.user_id.is_none() {
                n.user_id = notifications_topic_user(&env.topic).map(UserId::from);
            }
            Some(n)
        }
        Ok(env) => {
            tracing::trace!(event = %env.event, "Ignoring push event");
            None
        }
        // Bare notification objects are sent by older backends.
        Err(_) => normalize::notification(&value),
    }
}

pub struct WsPushTransport {
    ws_url: String,
    token: Option<String>,
    reconnect_delay: Duration,
    state: watch::Sender<ConnectionState>,
}

impl WsPushTransport {
    pub fn new(ws_url: impl Into<String>, token: Option<String>, reconnect_delay: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            ws_url: ws_url.into(),
            token,
            reconnect_delay: reconnect_delay.max(MIN_RECONNECT_DELAY),
            state,
        }
    }

    pub fn from_config(token: Option<String>) -> Self {
        let cfg = common::config::AppConfig::global();
        Self::new(
            cfg.ws_url.clone(),
            token,
            Duration::from_millis(cfg.push_reconnect_ms),
        )
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/notifications", self.ws_url.trim_end_matches('/')))
            .map_err(|e| ClientError::Validation(format!("invalid push url: {e}")))?;
        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}

/// One connection's lifetime. Returns `false` when the consumer is gone and
/// the reconnect loop should stop.
async fn run_connection(
    url: &Url,
    topic: &str,
    tx: &mpsc::Sender<Notification>,
    state: &watch::Sender<ConnectionState>,
) -> bool {
    state.send_replace(ConnectionState::Connecting);
    let (ws, _) = match connect_async(url.as_str()).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("Push connect to {} failed: {e}", url.host_str().unwrap_or("?"));
            return true;
        }
    };
    let (mut sink, mut source) = ws.split();

    let subscribe = WsOut::Subscribe {
        topics: vec![topic.to_string()],
    };
    let frame = match serde_json::to_string(&subscribe) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!("Could not encode subscribe frame: {e}");
            return false;
        }
    };
    if let Err(e) = sink.send(Message::Text(frame.into())).await {
        tracing::warn!("Push subscribe failed: {e}");
        return true;
    }
    state.send_replace(ConnectionState::Connected);
    tracing::info!(topic, "Push channel connected");

    loop {
        tokio::select! {
            _ = tx.closed() => {
                let _ = sink.send(Message::Close(None)).await;
                return false;
            }
            msg = source.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(n) = parse_frame(text.as_str()) {
                        if tx.send(n).await.is_err() {
                            return false;
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!(topic, "Push channel closed by server");
                    return true;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(topic, "Push channel error: {e}");
                    return true;
                }
            }
        }
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    async fn subscribe(&self, user: &UserId) -> Result<PushStream> {
        let url = self.endpoint()?;
        let topic = notifications_topic(user.as_str());
        let delay = self.reconnect_delay;
        let state = self.state.clone();
        let (tx, rx) = mpsc::channel::<Notification>(64);

        tokio::spawn(async move {
            loop {
                let keep_going = run_connection(&url, &topic, &tx, &state).await;
                state.send_replace(ConnectionState::Disconnected);
                if !keep_going || tx.is_closed() {
                    break;
                }
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            tracing::debug!(topic, "Push subscription ended");
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|n| (n, rx))
        });
        Ok(stream.boxed())
    }
}
