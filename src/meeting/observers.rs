//! In-page observers started and stopped by the lifecycle.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::browser::Page;
use crate::config::RecordingMode;

/// One participant tile as reported by the speakers observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerSnapshot {
    pub name: String,
    pub is_speaking: bool,
    /// Unix milliseconds.
    pub timestamp: i64,
}

pub type SpeakersCallback = Arc<dyn Fn(Vec<SpeakerSnapshot>) + Send + Sync>;

#[async_trait]
pub trait SpeakersObserver: Send + Sync {
    async fn start_observing(
        &self,
        page: Arc<dyn Page>,
        mode: RecordingMode,
        bot_name: &str,
        on_change: SpeakersCallback,
    ) -> Result<()>;

    async fn stop_observing(&self) -> Result<()>;
}

/// Strips page chrome that would otherwise end up in the recording.
#[async_trait]
pub trait HtmlCleaner: Send + Sync {
    async fn start(&self, page: Arc<dyn Page>) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// Dismisses blocking browser dialogs for the whole session.
#[async_trait]
pub trait DialogObserver: Send + Sync {
    async fn setup_global_dialog_observer(&self) -> Result<()>;
    async fn stop_global_dialog_observer(&self) -> Result<()>;
}
