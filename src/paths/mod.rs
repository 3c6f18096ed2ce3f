//! Per-session working directories.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{BotConfig, Environment};
use crate::global;

pub mod snapshot;

pub use snapshot::HtmlSnapshotService;

/// Where session directories are rooted, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoots {
    /// Shared filesystem used by preprod and prod.
    pub efs_mount_point: PathBuf,
    /// Local root used by every other environment.
    pub local_root: PathBuf,
}

impl StorageRoots {
    pub fn from_config(bot: &BotConfig) -> Result<Self> {
        Ok(Self {
            efs_mount_point: PathBuf::from(&bot.efs_mount_point),
            local_root: global::sessions_dir()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathManager {
    base: PathBuf,
    environ: Environment,
}

impl PathManager {
    pub fn for_session(roots: &StorageRoots, environ: Environment, bot_uuid: &str) -> Self {
        let base = if environ.uses_shared_storage() {
            roots.efs_mount_point.join(environ.as_str()).join(bot_uuid)
        } else {
            roots.local_root.join(bot_uuid)
        };

        Self { base, environ }
    }

    pub fn environ(&self) -> Environment {
        self.environ
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn output_path(&self) -> PathBuf {
        self.base.join("output")
    }

    pub fn temp_path(&self) -> PathBuf {
        self.base.join("temp")
    }

    pub fn audio_tmp_path(&self) -> PathBuf {
        self.base.join("audio_tmp")
    }

    pub fn screenshots_path(&self) -> PathBuf {
        self.base.join("screenshots")
    }

    pub fn html_snapshots_path(&self) -> PathBuf {
        self.base.join("html_snapshots")
    }

    /// Directories removed at the end of a production session.
    pub fn scratch_paths(&self) -> [PathBuf; 4] {
        [
            self.temp_path(),
            self.screenshots_path(),
            self.html_snapshots_path(),
            self.audio_tmp_path(),
        ]
    }

    pub async fn initialize(&self) -> Result<()> {
        let paths = [
            self.base.clone(),
            self.output_path(),
            self.temp_path(),
            self.audio_tmp_path(),
            self.screenshots_path(),
            self.html_snapshots_path(),
        ];

        for path in &paths {
            tokio::fs::create_dir_all(path)
                .await
                .with_context(|| format!("Failed to create directory {:?}", path))?;
            debug!("Created directory: {:?}", path);
        }

        info!("Session directories ready under {:?}", self.base);
        Ok(())
    }

    /// Remove everything inside `path`, keeping the directory itself. Entry
    /// failures are logged and skipped. Returns how many entries were removed.
    pub async fn purge_directory(path: &Path) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read directory {:?}", path))
            }
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);

            let result = if is_dir {
                tokio::fs::remove_dir_all(&entry_path).await
            } else {
                tokio::fs::remove_file(&entry_path).await
            };

            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {:?}: {}", entry_path, e),
            }
        }

        debug!("Purged {} entries from {:?}", removed, path);
        Ok(removed)
    }
}
