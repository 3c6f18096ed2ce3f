use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Process that feeds a branding image into the bot's camera.
#[async_trait]
pub trait BrandingProcess: Send + Sync {
    async fn wait_ready(&self) -> Result<()>;
    async fn kill(&self) -> Result<()>;
}

#[async_trait]
pub trait Branding: Send + Sync {
    async fn launch(&self, image_path: &str, bot_name: &str) -> Result<Arc<dyn BrandingProcess>>;
}
