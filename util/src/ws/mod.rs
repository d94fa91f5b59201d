//! Push-channel frame shapes shared by the sender and the receiving client.

pub mod topics;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standard event envelope delivered over WebSocket topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    #[serde(rename = "type")]
    pub r#type: String,
    pub event: String,
    pub topic: String,
    pub payload: T,
    #[serde(default)]
    pub ts: String,
}

impl<T> EventEnvelope<T> {
    pub fn new(topic: impl Into<String>, event: impl Into<String>, payload: T) -> Self {
        Self {
            r#type: "event".into(),
            event: event.into(),
            topic: topic.into(),
            payload,
            ts: Utc::now().to_rfc3339(),
        }
    }
}

/// Client → server control frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOut {
    Subscribe { topics: Vec<String> },
}

/// Returns `true` for `{"type":"ping"}` / `{"type":"pong"}` keep-alive frames.
pub fn is_keepalive(raw: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => matches!(
            map.get("type").and_then(|t| t.as_str()),
            Some("ping") | Some("pong")
        ) || map.get("event").and_then(|e| e.as_str()) == Some("pong"),
        _ => false,
    }
}
