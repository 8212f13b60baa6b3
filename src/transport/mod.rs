//! File transport to target hosts. The engine only talks to [`Transport`].
pub mod local;
pub mod ssh;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

pub use local::LocalTransport;
pub use ssh::SshTransport;

/// Mode and ownership a deployed file gets on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePerms {
    pub mode: u32,
    pub owner: String,
    pub group: String,
}

impl FilePerms {
    pub fn new(mode: u32, owner: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            mode,
            owner: owner.into(),
            group: group.into(),
        }
    }

    /// Zone files: read-only, owned by root.
    pub fn zonefile() -> Self {
        Self::new(0o444, "root", "root")
    }
}

impl fmt::Display for FilePerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o} {}:{}", self.mode, self.owner, self.group)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether `path` is a regular file on `host`.
    async fn exists(&self, host: &str, path: &str) -> anyhow::Result<bool>;

    /// Contents of `path` on `host`, `None` when there is nothing there.
    async fn fetch(&self, host: &str, path: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Atomically install the local file `source` at `path` on `host`.
    async fn deploy(&self, host: &str, source: &Path, path: &str, perms: &FilePerms) -> anyhow::Result<()>;
}
