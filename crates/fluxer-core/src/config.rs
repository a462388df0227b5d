//! Client configuration, loadable from TOML and the environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment variable overriding [`ClientConfig::api_base_url`]
pub const API_URL_ENV: &str = "FLUXER_API_URL";

pub const DEFAULT_API_BASE_URL: &str = "https://api.fluxer.app";
pub const DEFAULT_WEBAPP_ORIGIN: &str = "https://web.fluxer.app";
pub const DEFAULT_MEDIA_BASE_URL: &str = "https://fluxerusercontent.com";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Root of the REST API; auth and discovery requests go here
    pub api_base_url: String,
    /// Origin sent with client requests when discovery names none
    pub webapp_origin: String,
    /// Where avatars are served from
    pub media_base_url: String,
    pub sync: SyncSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            webapp_origin: DEFAULT_WEBAPP_ORIGIN.to_string(),
            media_base_url: DEFAULT_MEDIA_BASE_URL.to_string(),
            sync: SyncSettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Read a TOML config file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env();
        Ok(config)
    }

    /// Load `path` if it exists, else the defaults; environment overrides apply either way
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_api_url(std::env::var(API_URL_ENV).ok());
    }

    fn apply_api_url(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
    }
}

const MIN_POLL_INTERVAL_MS: u64 = 1;

/// Timings and thresholds of an open chat view
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    pub poll_interval_ms: u64,
    /// How many of the latest messages each load or poll asks for
    pub message_window: u32,
    /// Distance from the bottom, in pixels, that still counts as "at the bottom"
    pub bottom_threshold_px: f64,
    pub follow_debounce_ms: u64,
    /// Delay before the first scroll to the bottom after the initial load
    pub initial_scroll_delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3500,
            message_window: 50,
            bottom_threshold_px: 80.0,
            follow_debounce_ms: 50,
            initial_scroll_delay_ms: 100,
        }
    }
}

impl SyncSettings {
    /// Never zero: a ticker cannot run with an empty period
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn follow_debounce(&self) -> Duration {
        Duration::from_millis(self.follow_debounce_ms)
    }

    pub fn initial_scroll_delay(&self) -> Duration {
        Duration::from_millis(self.initial_scroll_delay_ms)
    }
}
