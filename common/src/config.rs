//! Global client configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton holding
//! runtime values loaded from `.env` and the process environment. Setters
//! exist so tests and embedding applications can override single fields.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock, RwLockReadGuard};

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    /// Base URL of the REST backend, without a trailing slash.
    pub api_base_url: String,
    /// Base URL of the push channel (`ws://` or `wss://`).
    pub ws_url: String,
    pub http_timeout_secs: u64,
    /// Interval of the notification safety-net refetch.
    pub notification_poll_secs: u64,
    pub push_reconnect_ms: u64,
    pub max_upload_bytes: u64,
    /// Lower-case extensions without the leading dot.
    pub allowed_upload_extensions: Vec<String>,
    pub max_score: f64,
}

static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Missing or malformed values fall back to development defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: var_or("APP_ENV", "development"),
            project_name: var_or("PROJECT_NAME", "edunex"),
            log_level: var_or("LOG_LEVEL", "info"),
            log_file: var_or("LOG_FILE", "edunex.log"),
            log_to_stdout: var_or("LOG_TO_STDOUT", "false") == "true",
            api_base_url: var_or("API_BASE_URL", "http://127.0.0.1:5000/api")
                .trim_end_matches('/')
                .to_string(),
            ws_url: var_or("WS_URL", "ws://127.0.0.1:5000/ws")
                .trim_end_matches('/')
                .to_string(),
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", 15),
            notification_poll_secs: parse_or("NOTIFICATION_POLL_SECS", 30),
            push_reconnect_ms: parse_or("PUSH_RECONNECT_MS", 2_000),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            allowed_upload_extensions: parse_extensions(&var_or(
                "ALLOWED_UPLOAD_EXTENSIONS",
                "pdf,doc,docx,txt,zip,png,jpg,jpeg",
            )),
            max_score: parse_or("MAX_SCORE", 100.0),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// A poisoned lock is recovered, since the config holds plain values.
    pub fn global() -> RwLockReadGuard<'static, AppConfig> {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reloads the configuration from the environment, dropping overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().unwrap_or_else(|p| p.into_inner());
            *guard = AppConfig::from_env();
        }
    }

    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock.write().unwrap_or_else(|p| p.into_inner());
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_api_base_url(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.api_base_url = value.into().trim_end_matches('/').into());
    }

    pub fn set_ws_url(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.ws_url = value.into().trim_end_matches('/').into());
    }

    pub fn set_http_timeout_secs(value: u64) {
        AppConfig::set_field(|cfg| cfg.http_timeout_secs = value);
    }

    pub fn set_notification_poll_secs(value: u64) {
        AppConfig::set_field(|cfg| cfg.notification_poll_secs = value);
    }

    pub fn set_push_reconnect_ms(value: u64) {
        AppConfig::set_field(|cfg| cfg.push_reconnect_ms = value);
    }

    pub fn set_max_upload_bytes(value: u64) {
        AppConfig::set_field(|cfg| cfg.max_upload_bytes = value);
    }

    pub fn set_allowed_upload_extensions(value: &str) {
        AppConfig::set_field(|cfg| cfg.allowed_upload_extensions = parse_extensions(value));
    }

    pub fn set_max_score(value: f64) {
        AppConfig::set_field(|cfg| cfg.max_score = value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn extensions_are_normalized() {
        assert_eq!(
            parse_extensions(" .PDF, docx ,,zip"),
            vec!["pdf".to_string(), "docx".into(), "zip".into()]
        );
    }

    #[test]
    #[serial]
    fn setters_override_and_reset_restores() {
        AppConfig::set_max_upload_bytes(42);
        AppConfig::set_api_base_url("http://example.test/api/");
        {
            let cfg = AppConfig::global();
            assert_eq!(cfg.max_upload_bytes, 42);
            assert_eq!(cfg.api_base_url, "http://example.test/api");
        }

        AppConfig::reset();
        assert_ne!(AppConfig::global().max_upload_bytes, 42);
    }

    #[test]
    #[serial]
    fn transport_and_grading_setters() {
        AppConfig::set_ws_url("wss://push.example.test/ws");
        AppConfig::set_http_timeout_secs(3);
        AppConfig::set_notification_poll_secs(5);
        AppConfig::set_push_reconnect_ms(250);
        AppConfig::set_allowed_upload_extensions("PDF");
        AppConfig::set_max_score(20.0);
        {
            let cfg = AppConfig::global();
            assert_eq!(cfg.ws_url, "wss://push.example.test/ws");
            assert_eq!(cfg.http_timeout_secs, 3);
            assert_eq!(cfg.notification_poll_secs, 5);
            assert_eq!(cfg.push_reconnect_ms, 250);
            assert_eq!(cfg.allowed_upload_extensions, vec!["pdf".to_string()]);
            assert_eq!(cfg.max_score, 20.0);
        }
        AppConfig::reset();
    }
}
