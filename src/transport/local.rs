use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use super::{FilePerms, Transport};

/// Deploys into the local filesystem, with every target path placed under
/// `root`. The host argument is ignored.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn exists(&self, _host: &str, path: &str) -> anyhow::Result<bool> {
        let target = self.resolve(path);
        match tokio::fs::metadata(&target).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("failed to stat {}", target.display())),
        }
    }

    async fn fetch(&self, _host: &str, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let target = self.resolve(path);
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", target.display())),
        }
    }

    async fn deploy(&self, _host: &str, source: &Path, path: &str, perms: &FilePerms) -> anyhow::Result<()> {
        let target = self.resolve(path);
        let parent = target
            .parent()
            .with_context(|| format!("{} has no parent directory", target.display()))?;
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let file_name = target
            .file_name()
            .with_context(|| format!("{} has no file name", target.display()))?;
        let staging = parent.join(format!(".{}.zonedeploy", file_name.to_string_lossy()));

        if tokio::fs::metadata(&staging).await.is_ok() {
            tokio::fs::remove_file(&staging)
                .await
                .with_context(|| format!("failed to remove stale {}", staging.display()))?;
        }
        tokio::fs::copy(source, &staging)
            .await
            .with_context(|| format!("failed to copy {} to {}", source.display(), staging.display()))?;
        set_mode(&staging, perms.mode).await?;
        tokio::fs::rename(&staging, &target)
            .await
            .with_context(|| format!("failed to move {} into place", target.display()))?;

        // owner and group are not applied locally
        debug!(path = %target.display(), perms = %perms, "deployed file");
        Ok(())
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> anyhow::Result<()> {
    Ok(())
}
