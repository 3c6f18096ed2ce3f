//! Per-session parameters handed over by the job layer, and the resolved
//! timing budgets for one session.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::TimeoutConfig;
use crate::state_machine::constants::DEFAULT_WAITING_ROOM_TIMEOUT_SECS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Preprod,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Preprod => "preprod",
            Self::Prod => "prod",
        }
    }

    /// Whether session files live on the shared filesystem.
    pub fn uses_shared_storage(&self) -> bool {
        matches!(self, Self::Preprod | Self::Prod)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMode {
    #[default]
    SpeakerView,
    GalleryView,
    AudioOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomaticLeave {
    /// Seconds the bot waits in the waiting room before giving up.
    pub waiting_room_timeout: u64,
}

impl Default for AutomaticLeave {
    fn default() -> Self {
        Self {
            waiting_room_timeout: DEFAULT_WAITING_ROOM_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    pub meeting_url: String,
    #[serde(default = "generate_bot_uuid")]
    pub bot_uuid: String,
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default)]
    pub environ: Environment,
    #[serde(default)]
    pub recording_mode: RecordingMode,
    #[serde(default)]
    pub streaming_input: Option<String>,
    #[serde(default)]
    pub streaming_output: Option<String>,
    #[serde(default)]
    pub enter_message: Option<String>,
    #[serde(default)]
    pub custom_branding_bot_path: Option<String>,
    #[serde(default)]
    pub automatic_leave: AutomaticLeave,
}

fn generate_bot_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_bot_name() -> String {
    "Recorder Bot".to_string()
}

impl SessionParams {
    pub fn new(meeting_url: impl Into<String>) -> Self {
        Self {
            meeting_url: meeting_url.into(),
            bot_uuid: generate_bot_uuid(),
            bot_name: default_bot_name(),
            environ: Environment::default(),
            recording_mode: RecordingMode::default(),
            streaming_input: None,
            streaming_output: None,
            enter_message: None,
            custom_branding_bot_path: None,
            automatic_leave: AutomaticLeave::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json).context("Failed to parse session params")?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session params from {:?}", path))?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.meeting_url.trim().is_empty() {
            bail!("meeting_url must not be empty");
        }
        if self.bot_uuid.trim().is_empty() {
            bail!("bot_uuid must not be empty");
        }
        Ok(())
    }

    pub fn waiting_room_timeout(&self) -> Duration {
        Duration::from_secs(self.automatic_leave.waiting_room_timeout)
    }
}

/// Every budget a session's state handlers consult.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub waiting_room: Duration,
    pub setup: Duration,
    pub recording: Duration,
    pub initial_wait: Duration,
    pub silence: Duration,
    pub cleanup: Duration,
    pub max_pause: Duration,
    pub empty_meeting_confirmation: Duration,
    pub pause_resume: Duration,
    pub component_stop: Duration,
}

impl SessionTimeouts {
    pub fn from_config(config: &TimeoutConfig, waiting_room_secs: u64) -> Self {
        Self {
            waiting_room: Duration::from_secs(waiting_room_secs),
            setup: Duration::from_millis(config.setup_ms),
            recording: Duration::from_millis(config.recording_ms),
            initial_wait: Duration::from_millis(config.initial_wait_ms),
            silence: Duration::from_millis(config.silence_ms),
            cleanup: Duration::from_millis(config.cleanup_ms),
            max_pause: Duration::from_millis(config.max_pause_ms),
            empty_meeting_confirmation: Duration::from_millis(config.empty_meeting_confirmation_ms),
            pause_resume: Duration::from_millis(config.pause_resume_ms),
            component_stop: Duration::from_millis(config.component_stop_ms),
        }
    }
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self::from_config(&TimeoutConfig::default(), DEFAULT_WAITING_ROOM_TIMEOUT_SECS)
    }
}
