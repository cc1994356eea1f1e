//! # Backup Manager
//!
//! Copies files into a timestamped directory before they are rewritten,
//! mirroring their path relative to the project root.

use async_trait::async_trait;
use chrono::Local;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::BackupConfig;
use crate::errors::ServiceError;

#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Create the destination for this run. Called once before any write.
    async fn prepare(&self) -> Result<PathBuf, ServiceError>;

    /// Copy `path` into the destination, returning the backup's location.
    async fn snapshot(&self, path: &Path) -> Result<PathBuf, ServiceError>;
}

pub struct BackupManager {
    root: PathBuf,
    project_root: Option<PathBuf>,
    destination: OnceCell<PathBuf>,
}

impl BackupManager {
    pub fn new(config: &BackupConfig) -> Self {
        Self {
            root: config.root.clone(),
            project_root: config.project_root.clone(),
            destination: OnceCell::new(),
        }
    }

    /// Location of `path` inside a backup directory.
    fn mirrored_path(&self, path: &Path) -> PathBuf {
        let relative = self
            .project_root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);
        relative
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect()
    }
}

#[async_trait]
impl BackupStore for BackupManager {
    async fn prepare(&self) -> Result<PathBuf, ServiceError> {
        let destination = self
            .destination
            .get_or_try_init(|| async {
                let dir = self
                    .root
                    .join(Local::now().format("backup_%Y%m%d_%H%M%S").to_string());
                fs::create_dir_all(&dir)
                    .await
                    .map_err(|source| ServiceError::BackupFailure {
                        path: dir.clone(),
                        source,
                    })?;
                info!("Backups will be written to {}", dir.display());
                Ok::<_, ServiceError>(dir)
            })
            .await?;
        Ok(destination.clone())
    }

    async fn snapshot(&self, path: &Path) -> Result<PathBuf, ServiceError> {
        let destination = self.prepare().await?;
        let target = destination.join(self.mirrored_path(path));
        let failure = |source| ServiceError::BackupFailure {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(failure)?;
        }
        fs::copy(path, &target).await.map_err(failure)?;
        debug!("Backed up {} to {}", path.display(), target.display());
        Ok(target)
    }
}
