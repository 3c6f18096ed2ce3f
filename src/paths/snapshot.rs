use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::meeting::Page;
use crate::state_machine::constants::SNAPSHOT_TIMEOUT;

/// Dumps page HTML for post-mortem debugging.
#[derive(Debug, Clone)]
pub struct HtmlSnapshotService {
    dir: PathBuf,
    timeout: Duration,
}

impl HtmlSnapshotService {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            timeout: SNAPSHOT_TIMEOUT,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the page content to `<dir>/<label>_<unix_ms>.html`. Never fails
    /// outward; returns the written path on success.
    pub async fn capture(&self, page: &dyn Page, label: &str) -> Option<PathBuf> {
        if page.is_closed() {
            debug!("Skipping HTML snapshot {}: page is closed", label);
            return None;
        }

        match tokio::time::timeout(self.timeout, self.write_snapshot(page, label)).await {
            Ok(Ok(path)) => {
                debug!("HTML snapshot saved: {:?}", path);
                Some(path)
            }
            Ok(Err(e)) => {
                warn!("Failed to capture HTML snapshot {}: {:#}", label, e);
                None
            }
            Err(_) => {
                warn!(
                    "HTML snapshot {} timed out after {}s",
                    label,
                    self.timeout.as_secs()
                );
                None
            }
        }
    }

    async fn write_snapshot(&self, page: &dyn Page, label: &str) -> Result<PathBuf> {
        let html = page.content().await.context("Failed to read page content")?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("Failed to create snapshot directory")?;

        let path = self.dir.join(format!(
            "{}_{}.html",
            label,
            chrono::Utc::now().timestamp_millis()
        ));
        tokio::fs::write(&path, html)
            .await
            .context("Failed to write snapshot")?;

        Ok(path)
    }
}
