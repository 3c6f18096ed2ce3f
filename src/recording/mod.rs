//! Capture-side collaborators: the recorder, the streaming bridge and the
//! branding process. Encoding and upload live behind these traits.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::meeting::Page;

pub mod branding;
pub mod streaming;

pub use branding::{Branding, BrandingProcess};
pub use streaming::StreamingService;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// Stop was called while nothing was being recorded. Treated as success.
    #[error("recorder is not recording")]
    NotRecording,
    #[error("recorder failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Recorder: Send + Sync {
    async fn start_recording(&self, page: Arc<dyn Page>) -> Result<()>;
    async fn stop_recording(&self) -> Result<(), RecorderError>;
    fn is_currently_recording(&self) -> bool;
    /// Unix milliseconds at which the call was joined.
    fn set_meeting_start_time(&self, timestamp: i64);
    /// Failure reported asynchronously by the capture pipeline, if any.
    fn last_error(&self) -> Option<String>;
}
