use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Credentials;
use crate::quality::Quality;

/// Scheduler and progress-channel timing (optional `[timing]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Sleep between ticks when nothing is queued or in flight.
    pub idle_poll_ms: u64,
    /// Sleep between ticks when at capacity.
    pub busy_poll_ms: u64,
    /// Absolute ceiling for one progress channel, in seconds.
    pub progress_timeout_secs: u64,
    /// How long a dropped progress stream may take to recover, in seconds.
    pub reconnect_grace_secs: u64,
    /// Delay before reopening a dropped progress stream.
    pub reconnect_delay_ms: u64,
    /// Timeout for the start-download request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            idle_poll_ms: 1000,
            busy_poll_ms: 500,
            progress_timeout_secs: 300,
            reconnect_grace_secs: 5,
            reconnect_delay_ms: 500,
            request_timeout_secs: 30,
        }
    }
}

/// Resolved timing values used at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub idle_poll: Duration,
    pub busy_poll: Duration,
    pub progress_timeout: Duration,
    pub reconnect_grace: Duration,
    pub reconnect_delay: Duration,
    pub request_timeout: Duration,
}

impl From<&TimingConfig> for Timing {
    fn from(cfg: &TimingConfig) -> Self {
        Self {
            idle_poll: Duration::from_millis(cfg.idle_poll_ms),
            busy_poll: Duration::from_millis(cfg.busy_poll_ms),
            progress_timeout: Duration::from_secs(cfg.progress_timeout_secs),
            reconnect_grace: Duration::from_secs(cfg.reconnect_grace_secs),
            reconnect_delay: Duration::from_millis(cfg.reconnect_delay_ms),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Timing::from(&TimingConfig::default())
    }
}

/// Credentials for the backend (optional `[auth]` section).
/// Either `username` (+ `password`) for HTTP Basic, or `token` for Bearer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl AuthConfig {
    pub fn credentials(&self) -> Option<Credentials> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Some(Credentials::Bearer(token.to_string()));
        }
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        Some(Credentials::Basic {
            username: username.to_string(),
            password: self.password.clone(),
        })
    }
}

/// Extra per-download options forwarded to the backend (optional `[options]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Library layout template, e.g. "{Artist}/{Album}/{TrackNumber} - {Title}".
    pub organization_template: String,
    pub group_compilations: bool,
    pub run_beets: bool,
    pub embed_lyrics: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            organization_template: "{Artist}/{Album}/{TrackNumber} - {Title}".to_string(),
            group_compilations: true,
            run_beets: false,
            embed_lyrics: false,
        }
    }
}

/// Global configuration loaded from `~/.config/trackq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackqConfig {
    /// Base URL of the backend API; endpoints are joined onto it.
    pub backend_url: String,
    /// Maximum number of simultaneous downloads.
    pub max_concurrent_downloads: usize,
    /// Requested quality; falls back one tier when unavailable.
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub timing: Option<TimingConfig>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub options: Option<DownloadOptions>,
}

impl Default for TrackqConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000/api/".to_string(),
            max_concurrent_downloads: 3,
            quality: Quality::HiResLossless,
            timing: None,
            auth: None,
            options: None,
        }
    }
}

impl TrackqConfig {
    pub fn timing(&self) -> Timing {
        self.timing.as_ref().map(Timing::from).unwrap_or_default()
    }

    pub fn download_options(&self) -> DownloadOptions {
        self.options.clone().unwrap_or_default()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.auth.as_ref().and_then(AuthConfig::credentials)
    }

    /// Applies `TRACKQ_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("TRACKQ_BACKEND_URL") {
            self.backend_url = url;
        }
        let username = lookup("TRACKQ_USERNAME");
        let password = lookup("TRACKQ_PASSWORD");
        let token = lookup("TRACKQ_TOKEN");
        if username.is_some() || password.is_some() || token.is_some() {
            let auth = self.auth.get_or_insert_with(AuthConfig::default);
            if username.is_some() {
                auth.username = username;
            }
            if password.is_some() {
                auth.password = password;
            }
            if token.is_some() {
                auth.token = token;
            }
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("trackq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TrackqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TrackqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<TrackqConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: TrackqConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
