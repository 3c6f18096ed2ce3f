//! Browser automation handles. Implementations drive a real browser; the
//! lifecycle core only opens, inspects and closes them.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::SessionParams;

/// A meeting page inside a browser session.
#[async_trait]
pub trait Page: Send + Sync {
    /// Serialized DOM of the page.
    async fn content(&self) -> Result<String>;
    fn is_closed(&self) -> bool;
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, params: &SessionParams) -> Result<Arc<dyn BrowserSession>>;
}
