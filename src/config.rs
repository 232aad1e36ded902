//! Service configuration loaded from `~/.config/streamsift/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime configuration. Every key is optional in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP API listens on.
    pub bind: String,
    /// Root of the anime site episode pages live on.
    pub anime_base_url: String,
    /// Root of the comic site.
    pub comic_base_url: String,
    /// Per-request socket timeout.
    pub request_timeout_secs: u64,
    /// Attempts per GET/POST before giving up.
    pub max_attempts: u32,
    /// First backoff delay; doubled after every failed attempt.
    pub initial_backoff_ms: u64,
    /// Fixed pause before each attempt on rotating-agent sites.
    pub courtesy_delay_ms: u64,
    /// Download rows resolved at the same time within one episode.
    pub resolve_concurrency: usize,
    /// `action` field of the embed lookup POST.
    pub ajax_action: String,
    /// On-disk app version record.
    pub version_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            anime_base_url: "https://winbu.tv".to_string(),
            comic_base_url: "https://komikindo.ch".to_string(),
            request_timeout_secs: 10,
            max_attempts: 3,
            initial_backoff_ms: 2000,
            courtesy_delay_ms: 1000,
            resolve_concurrency: 4,
            ajax_action: "doo_player_ajax".to_string(),
            version_file: PathBuf::from("app_version.json"),
        }
    }
}

impl Config {
    /// Load from an explicit path, or from the default location if `None`.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let p = default_path();
                if p.exists() {
                    Self::from_file(&p)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }
}

/// Return the path to the default config file.
fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("streamsift")
        .join("config.toml")
}
