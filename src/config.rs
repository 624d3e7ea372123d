//! Application configuration
//!
//! Loaded from TOML (explicit path or the platform config directory), then
//! overridden by the environment. Every section has defaults, so an empty or
//! missing file yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::protocol::CameraLocation;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    pub relay: RelayConfig,
    pub ui: UiConfig,
    pub store: StoreConfig,
    pub camera: CameraLocation,
}

/// Upstream camera endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// URL returning one JPEG frame per GET
    pub url: String,
    /// Bound on a single fetch, in milliseconds
    pub fetch_timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

/// Which stop signal a relay loop observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleScope {
    /// One process-wide switch: any stop ends every session
    #[default]
    Shared,
    /// Each session has its own cancellation handle
    Session,
}

/// How viewers share the upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fanout {
    /// Every viewer runs its own fetch loop
    #[default]
    PerViewer,
    /// One fetch loop feeds all viewers
    Broadcast,
}

/// Relay behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Fixed delay before retrying a failed fetch, in milliseconds
    pub backoff_ms: u64,
    pub lifecycle_scope: LifecycleScope,
    pub fanout: Fanout,
    /// Frames buffered per viewer in broadcast mode
    pub broadcast_capacity: usize,
}

impl RelayConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            backoff_ms: DEFAULT_BACKOFF_MS,
            lifecycle_scope: LifecycleScope::default(),
            fanout: Fanout::default(),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub bind_address: String,
    pub http_port: u16,
    /// Directory of dashboard assets served at `/`
    pub static_dir: Option<PathBuf>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            static_dir: None,
        }
    }
}

/// Telemetry database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE_FILE),
        }
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the platform config file is
    /// used when present and defaults otherwise. Environment overrides are
    /// applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Platform config location, e.g. `~/.config/reefwatch/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "reefwatch")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(UPSTREAM_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.upstream.url = url;
        }
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.upstream.url.trim().is_empty() {
            return Err(Error::Config("upstream.url must not be empty".into()));
        }
        if self.upstream.fetch_timeout_ms == 0 {
            return Err(Error::Config("upstream.fetch_timeout_ms must be positive".into()));
        }
        if self.relay.broadcast_capacity == 0 {
            return Err(Error::Config("relay.broadcast_capacity must be positive".into()));
        }
        Ok(())
    }
}
