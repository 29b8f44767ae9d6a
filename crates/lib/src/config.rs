//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.msgbridge/config.json`) and environment.
//! Everything has a default, so a missing file is a valid setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Webhook used when neither config nor env sets one.
pub const DEFAULT_WEBHOOK_URL: &str = "http://localhost:3000/api/webhook";

/// Reply sent to the user when the webhook cannot be reached or answers badly.
pub const DEFAULT_FALLBACK_REPLY: &str =
    "Sorry, something went wrong on our server. Please try again later.";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook endpoint and request settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Messaging session settings (store file, network endpoint).
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Webhook settings. `url` is optional so an unset value can be reported before falling back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Endpoint that receives `{sender, message}` POSTs. Overridden by MSGBRIDGE_WEBHOOK_URL env.
    pub url: Option<String>,

    /// Request timeout in seconds (default 15).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Text sent back to the user when the webhook call fails.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

/// Session store and network endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Local session store file (default "session.json", relative to the working directory).
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// WebSocket endpoint of the messaging network bridge.
    #[serde(default = "default_network_url")]
    pub network_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// env_logger filter used when RUST_LOG is unset (e.g. "info", "debug", "bridge=debug").
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_fallback_reply() -> String {
    DEFAULT_FALLBACK_REPLY.to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("session.json")
}

fn default_network_url() -> String {
    "ws://127.0.0.1:15152/ws".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            network_url: default_network_url(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the webhook URL: env MSGBRIDGE_WEBHOOK_URL overrides config. None when neither is set.
pub fn resolve_webhook_url(config: &Config) -> Option<String> {
    non_empty_env("MSGBRIDGE_WEBHOOK_URL").or_else(|| {
        config
            .webhook
            .url
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Apply MSGBRIDGE_* environment overrides on top of the file config.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(url) = resolve_webhook_url(config) {
        config.webhook.url = Some(url);
    }
    if let Some(path) = non_empty_env("MSGBRIDGE_STORE_PATH") {
        config.session.store_path = PathBuf::from(path);
    }
    if let Some(url) = non_empty_env("MSGBRIDGE_NETWORK_URL") {
        config.session.network_url = url;
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MSGBRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".msgbridge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default path). Missing file => default config.
/// Environment overrides are applied before returning.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    apply_env_overrides(&mut config);
    Ok((config, path))
}
