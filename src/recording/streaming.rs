use anyhow::Result;
use async_trait::async_trait;

/// Live audio bridge between the call and an external endpoint.
#[async_trait]
pub trait StreamingService: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn resume(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    /// Current input level on a 0-100 scale.
    fn current_sound_level(&self) -> f32;
}
