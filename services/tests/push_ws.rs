mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::{Router, routing::get};
use futures::StreamExt;
use helpers::mock::notification;
use helpers::{MockNotifications, spawn_server};
use serde_json::json;
use services::model::{Role, UserId};
use services::push::{ConnectionState, PushStream, PushTransport, WsPushTransport};
use services::{NotificationRelay, Session, poller};
use util::bus::EventBus;
use util::ws::EventEnvelope;

#[derive(Clone, Default)]
struct PushServer {
    connections: Arc<AtomicUsize>,
    subscriptions: Arc<Mutex<Vec<serde_json::Value>>>,
    tokens: Arc<Mutex<Vec<String>>>,
}

#[derive(serde::Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn event(user: &str, id: &str, message: &str) -> String {
    let env = EventEnvelope::new(
        format!("notifications:user:{user}"),
        "notification",
        json!({ "_id": id, "userId": user, "message": message }),
    );
    serde_json::to_string(&env).unwrap()
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(q): Query<TokenQuery>,
    State(server): State<PushServer>,
) -> impl IntoResponse {
    server.tokens.lock().unwrap().push(q.token.unwrap_or_default());
    ws.on_upgrade(move |socket| serve(socket, server))
}

async fn serve(mut socket: WebSocket, server: PushServer) {
    let nth = server.connections.fetch_add(1, Ordering::SeqCst);

    if let Some(Ok(Message::Text(text))) = socket.recv().await {
        let frame: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        server.subscriptions.lock().unwrap().push(frame);
    }

    let frames = if nth == 0 {
        vec![
            json!({ "type": "ping" }).to_string(),
            event("u2", "foreign", "not for you"),
            event("u1", "N1", "Grades published"),
            event("u1", "N1", "Grades published"),
            serde_json::to_string(&EventEnvelope::new("x", "announcement", json!({ "id": "A" })))
                .unwrap(),
        ]
    } else {
        // Recipient implied by the per-user topic only.
        let env = EventEnvelope::new(
            "notifications:user:u1",
            "notification",
            json!({ "_id": "N2", "message": "Timetable changed" }),
        );
        vec![serde_json::to_string(&env).unwrap()]
    };
    for f in frames {
        if socket.send(Message::Text(f.into())).await.is_err() {
            return;
        }
    }

    if nth == 0 {
        // Drop the first connection to force a reconnect.
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..150 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn relay_receives_pushes_across_reconnects() {
    let server = PushServer::default();
    let app = Router::new()
        .route("/ws/notifications", get(ws_handler))
        .with_state(server.clone());
    let addr = spawn_server(app).await;

    let transport = WsPushTransport::new(
        format!("ws://{addr}/ws"),
        Some("secret".into()),
        Duration::from_millis(50),
    );
    let mut state = transport.state();
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);

    let session = Session::new("u1", Role::Student).with_token("secret");
    let relay = NotificationRelay::new(
        session,
        Arc::new(MockNotifications::default()),
        EventBus::new(),
    );
    let tasks = poller::start(&relay, &transport, Duration::from_secs(60))
        .await
        .unwrap();

    eventually(|| {
        let relay = relay.clone();
        async move { relay.notifications().await.len() == 2 }
    })
    .await;

    let ids: Vec<_> = relay
        .notifications()
        .await
        .into_iter()
        .map(|n| n.id.to_string())
        .collect();
    assert_eq!(ids, vec!["N2", "N1"]);
    assert_eq!(relay.unread_count().await, 2);
    assert_eq!(server.connections.load(Ordering::SeqCst), 2);
    assert!(server.tokens.lock().unwrap().iter().all(|t| t == "secret"));
    assert_eq!(
        server.subscriptions.lock().unwrap()[0],
        json!({ "type": "subscribe", "topics": ["notifications:user:u1"] })
    );

    tokio::time::timeout(Duration::from_secs(2), async {
        while *state.borrow_and_update() != ConnectionState::Connected {
            state.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    tasks.shutdown().await;
}

#[tokio::test]
async fn transport_reports_failed_connection_as_disconnected() {
    // Nothing listens on this port once the listener is dropped.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = WsPushTransport::new(format!("ws://{addr}/ws"), None, Duration::from_millis(20));
    let state = transport.state();
    let mut stream = transport.subscribe(&UserId::from("u1")).await.unwrap();

    let next = tokio::time::timeout(Duration::from_millis(200), stream.next()).await;
    assert!(next.is_err(), "no notification can arrive without a server");
    assert_ne!(*state.borrow(), ConnectionState::Connected);
}

struct SilentTransport;

#[async_trait]
impl PushTransport for SilentTransport {
    async fn subscribe(&self, _user: &UserId) -> services::Result<PushStream> {
        Ok(futures::stream::pending().boxed())
    }
}

#[tokio::test]
async fn poller_refetches_through_fetch_all() {
    let backend = Arc::new(MockNotifications::with(vec![notification("N1", "u1", 0, false)]));
    let relay = NotificationRelay::new(
        Session::new("u1", Role::Student),
        backend.clone(),
        EventBus::new(),
    );

    let tasks = poller::start(&relay, &SilentTransport, Duration::from_millis(30))
        .await
        .unwrap();
    // Initial load happens before start returns.
    assert_eq!(relay.notifications().await.len(), 1);

    backend.server.lock().unwrap().push(notification("N2", "u1", 0, false));
    eventually(|| {
        let relay = relay.clone();
        async move { relay.notifications().await.len() == 2 }
    })
    .await;
    assert!(backend.fetches.load(Ordering::SeqCst) >= 2);

    tasks.shutdown().await;
    let after = backend.fetches.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.fetches.load(Ordering::SeqCst), after);
}
