use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::warn;

use crate::{notifier::DEFAULT_TOAST_TTL, polling::DEFAULT_POLL_INTERVAL};

pub const DEFAULT_SETTINGS_FILE: &str = "operator.toml";
const SELECTION_FILE_NAME: &str = "selection.json";
const APP_DIR_NAME: &str = "queue-operator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub toast_ttl_ms: u64,
    pub events_limit: u32,
    pub request_timeout_ms: u64,
    pub selection_path: PathBuf,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            toast_ttl_ms: DEFAULT_TOAST_TTL.as_millis() as u64,
            events_limit: 20,
            request_timeout_ms: 10_000,
            selection_path: default_selection_path(),
        }
    }
}

impl ClientSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_ttl_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }
}

fn default_selection_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(SELECTION_FILE_NAME)
}

/// Defaults, overlaid by the settings file (when present), overlaid by the
/// environment.
pub fn load_settings(settings_file: Option<&Path>) -> ClientSettings {
    let mut settings = ClientSettings::default();

    let path = settings_file.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, &file_cfg),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unparseable settings file")
            }
        }
    }

    apply_env_settings(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_settings(settings: &mut ClientSettings, file_cfg: &HashMap<String, toml::Value>) {
    if let Some(v) = file_cfg.get("server_url").and_then(toml::Value::as_str) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("poll_interval_ms").and_then(as_u64) {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = file_cfg.get("toast_ttl_ms").and_then(as_u64) {
        settings.toast_ttl_ms = v;
    }
    if let Some(v) = file_cfg.get("events_limit").and_then(as_u64) {
        settings.events_limit = u32::try_from(v).unwrap_or(u32::MAX);
    }
    if let Some(v) = file_cfg.get("request_timeout_ms").and_then(as_u64) {
        settings.request_timeout_ms = v;
    }
    if let Some(v) = file_cfg.get("selection_path").and_then(toml::Value::as_str) {
        settings.selection_path = PathBuf::from(v);
    }
}

fn as_u64(value: &toml::Value) -> Option<u64> {
    value.as_integer().and_then(|v| u64::try_from(v).ok())
}

fn apply_env_settings(settings: &mut ClientSettings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("QUEUE_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("APP__POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = env("APP__TOAST_TTL_MS").and_then(|v| v.parse().ok()) {
        settings.toast_ttl_ms = v;
    }
    if let Some(v) = env("APP__EVENTS_LIMIT").and_then(|v| v.parse().ok()) {
        settings.events_limit = v;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_ms = v;
    }
    if let Some(v) = env("APP__SELECTION_PATH") {
        settings.selection_path = PathBuf::from(v);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
