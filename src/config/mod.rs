use crate::global;
use crate::state_machine::constants;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod session;

pub use session::{Environment, RecordingMode, SessionParams, SessionTimeouts};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot: BotConfig,
    pub timeouts: TimeoutConfig,
    pub api: ApiConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Shared filesystem root used for session files in preprod and prod.
    pub efs_mount_point: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            efs_mount_point: "/mnt/efs".to_string(),
        }
    }
}

/// Lifecycle budgets, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub setup_ms: u64,
    pub recording_ms: u64,
    pub initial_wait_ms: u64,
    pub silence_ms: u64,
    pub cleanup_ms: u64,
    pub max_pause_ms: u64,
    pub empty_meeting_confirmation_ms: u64,
    pub pause_resume_ms: u64,
    pub component_stop_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            setup_ms: millis(constants::SETUP_TIMEOUT),
            recording_ms: millis(constants::RECORDING_TIMEOUT),
            initial_wait_ms: millis(constants::INITIAL_WAIT_TIME),
            silence_ms: millis(constants::SILENCE_TIMEOUT),
            cleanup_ms: millis(constants::CLEANUP_TIMEOUT),
            max_pause_ms: millis(constants::MAX_PAUSE_DURATION),
            empty_meeting_confirmation_ms: millis(constants::EMPTY_MEETING_CONFIRMATION),
            pause_resume_ms: millis(constants::PAUSE_RESUME_TIMEOUT),
            component_stop_ms: millis(constants::COMPONENT_STOP_TIMEOUT),
        }
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    duration.as_millis() as u64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3838,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Endpoint receiving `bot.status_change` webhooks. Events are only logged when unset.
    pub webhook_url: Option<String>,
    pub api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
