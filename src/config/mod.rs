use crate::storage::DEFAULT_STORE_NAME;
use serde::{Deserialize, Serialize};

const DEFAULT_AUTOSAVE_MS: u32 = 1000;
const DEFAULT_RETRY_MS: u32 = 5000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Runtime settings, read from `window.ENV` when the host page provides it.
///
/// ```html
/// <script>window.ENV = { STORE_NAME: "notes", AUTOSAVE_MS: 500, DEBUG: true }</script>
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Prefix for `localStorage` keys.
    pub store_name: String,
    /// Quiet period before an edit is saved.
    pub autosave_ms: u32,
    /// Delay before retrying a failed save.
    pub retry_ms: u32,
    /// `tracing` filter directive.
    pub log_level: String,
    /// Shows the reset/dump panel and skips the unload flush.
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_name: DEFAULT_STORE_NAME.to_string(),
            autosave_ms: DEFAULT_AUTOSAVE_MS,
            retry_ms: DEFAULT_RETRY_MS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            debug: false,
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl AppConfig {
    /// Build from a key lookup. Each setting is looked up upper-case first
    /// (`STORE_NAME`), then lower-case (`store_name`); missing or unparsable
    /// values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(&key.to_ascii_uppercase())
                .or_else(|| lookup(key))
                .filter(|v| !v.trim().is_empty())
        };

        let mut config = Self::default();

        if let Some(v) = get("store_name") {
            config.store_name = v.trim().to_string();
        }
        if let Some(v) = get("autosave_ms") {
            match v.trim().parse::<u32>() {
                Ok(ms) => config.autosave_ms = ms,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid AUTOSAVE_MS"),
            }
        }
        if let Some(v) = get("retry_ms") {
            match v.trim().parse::<u32>() {
                Ok(ms) if ms > 0 => config.retry_ms = ms,
                _ => tracing::warn!(value = %v, "ignoring invalid RETRY_MS"),
            }
        }
        if let Some(v) = get("log_level") {
            config.log_level = v.trim().to_string();
        }
        if let Some(v) = get("debug") {
            config.debug = parse_flag(&v);
        }

        config
    }

    /// Read `window.ENV`, plus the legacy `window.DEBUG` switch.
    pub fn from_window() -> Self {
        let Some(window) = web_sys::window() else {
            return Self::default();
        };

        let env = js_sys::Reflect::get(&window, &"ENV".into())
            .ok()
            .filter(|env| env.is_object());
        let legacy_debug = js_sys::Reflect::get(&window, &"DEBUG".into())
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let mut config = Self::from_lookup(|key| {
            let env = env.as_ref()?;
            let v = js_sys::Reflect::get(env, &key.into()).ok()?;
            v.as_string()
                .or_else(|| v.as_f64().map(|n| n.to_string()))
                .or_else(|| v.as_bool().map(|b| b.to_string()))
        });
        config.debug |= legacy_debug;
        config
    }
}
