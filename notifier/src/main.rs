//! Headless notification relay: keeps one user's notifications in sync and
//! logs every change until interrupted.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use common::config::AppConfig;
use common::logger::init_logging;
use services::model::Role;
use services::push::{ConnectionState, WsPushTransport};
use services::rest::RestBackend;
use services::{NotificationRelay, RelayEvent, Session, poller};
use tokio::sync::broadcast::error::RecvError;
use util::bus::EventBus;
use util::http::is_url_alive;

#[tokio::main]
async fn main() {
    let (log_file, log_level, log_to_stdout) = {
        let cfg = AppConfig::global();
        (cfg.log_file.clone(), cfg.log_level.clone(), cfg.log_to_stdout)
    };
    let _log_guard = init_logging("logs", &log_file, &log_level, log_to_stdout);

    if let Err(message) = run().await {
        tracing::error!("{message}");
        eprintln!("notifier: {message}");
        std::process::exit(1);
    }
}

fn session_from_env() -> Result<Session, String> {
    let user = env::var("EDUNEX_USER_ID").map_err(|_| "EDUNEX_USER_ID is not set".to_string())?;
    let role: Role = env::var("EDUNEX_ROLE")
        .unwrap_or_else(|_| "student".into())
        .parse()?;
    let session = Session::new(user, role);
    Ok(match env::var("EDUNEX_TOKEN") {
        Ok(token) if !token.is_empty() => session.with_token(token),
        _ => session,
    })
}

async fn run() -> Result<(), String> {
    let session = session_from_env()?;
    let (project, env, api, timeout, poll_secs) = {
        let cfg = AppConfig::global();
        (
            cfg.project_name.clone(),
            cfg.env.clone(),
            cfg.api_base_url.clone(),
            cfg.http_timeout_secs,
            cfg.notification_poll_secs,
        )
    };

    tracing::info!(user = %session.user_id(), "Starting {project} notifier ({env}) against {api}");
    match is_url_alive(&api, timeout).await {
        Ok(true) => tracing::info!("Backend reachable"),
        Ok(false) => tracing::warn!("Backend answered with an error status, continuing"),
        Err(e) => tracing::warn!("Backend unreachable ({e}), will keep retrying"),
    }

    let backend = RestBackend::from_config(session.clone()).map_err(|e| e.to_string())?;
    let relay = NotificationRelay::new(session.clone(), Arc::new(backend), EventBus::new());
    let mut events = relay.subscribe().await;

    let transport = WsPushTransport::from_config(session.token().map(str::to_string));
    let mut state = transport.state();

    let tasks = poller::start(&relay, &transport, Duration::from_secs(poll_secs.max(1)))
        .await
        .map_err(|e| e.to_string())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let now = *state.borrow_and_update();
                match now {
                    ConnectionState::Connected => tracing::info!("Push channel up"),
                    ConnectionState::Connecting => tracing::debug!("Push channel connecting"),
                    ConnectionState::Disconnected => tracing::warn!("Push channel down"),
                }
            }
            event = events.recv() => match event {
                Ok(RelayEvent::Changed { unread, total }) => {
                    tracing::info!(unread, total, "Notifications updated");
                }
                Ok(RelayEvent::Error { message }) => tracing::warn!("{message}"),
                Err(RecvError::Lagged(n)) => tracing::debug!("Skipped {n} relay events"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}
