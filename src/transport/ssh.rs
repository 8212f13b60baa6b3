use std::path::Path;
use std::process::Output;

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{FilePerms, Transport};

/// Reaches target hosts through the `ssh` and `scp` clients, relying on the
/// user's ssh configuration for authentication.
#[derive(Debug, Clone)]
pub struct SshTransport {
    ssh: String,
    scp: String,
}

impl Default for SshTransport {
    fn default() -> Self {
        Self {
            ssh: "ssh".into(),
            scp: "scp".into(),
        }
    }
}

impl SshTransport {
    pub fn new(ssh: impl Into<String>, scp: impl Into<String>) -> Self {
        Self {
            ssh: ssh.into(),
            scp: scp.into(),
        }
    }

    fn remote(&self, host: &str, script: &str) -> Command {
        let mut command = Command::new(&self.ssh);
        command.arg("-o").arg("BatchMode=yes").arg(host).arg(script);
        command
    }

    async fn run(&self, host: &str, script: &str) -> anyhow::Result<Output> {
        debug!(host, script, "running remote command");
        self.remote(host, script)
            .output()
            .await
            .with_context(|| format!("failed to run {} on {}", self.ssh, host))
    }
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Remote command that moves an uploaded file into place with `perms`.
///
/// The file is installed under a second name next to `staged` and renamed
/// over `path`, so readers of `path` see either the old or the new content.
/// Both staging names are removed whatever the outcome.
pub fn install_script(staged: &str, path: &str, perms: &FilePerms) -> String {
    let ready = shell_quote(&format!("{}.new", staged));
    let staged = shell_quote(staged);
    format!(
        "install -m {:04o} -o {} -g {} {staged} {ready} && mv -f {ready} {}; status=$?; rm -f {staged} {ready}; exit $status",
        perms.mode,
        shell_quote(&perms.owner),
        shell_quote(&perms.group),
        shell_quote(path),
    )
}

#[async_trait]
impl Transport for SshTransport {
    async fn exists(&self, host: &str, path: &str) -> anyhow::Result<bool> {
        let output = self.run(host, &format!("test -f {}", shell_quote(path))).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => bail!(
                "`test -f {}` on {} failed: {}",
                path,
                host,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }

    async fn fetch(&self, host: &str, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let quoted = shell_quote(path);
        let output = self
            .run(host, &format!("if [ -f {0} ]; then cat {0}; else exit 3; fi", quoted))
            .await?;
        match output.status.code() {
            Some(0) => Ok(Some(output.stdout)),
            Some(3) => Ok(None),
            _ => bail!(
                "reading {} on {} failed: {}",
                path,
                host,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }

    async fn deploy(&self, host: &str, source: &Path, path: &str, perms: &FilePerms) -> anyhow::Result<()> {
        let staged = format!("{}.zonedeploy", path);

        let status = Command::new(&self.scp)
            .arg("-q")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(source)
            .arg(format!("{}:{}", host, staged))
            .status()
            .await
            .with_context(|| format!("failed to run {}", self.scp))?;
        if !status.success() {
            bail!("uploading {} to {}:{} failed with {}", source.display(), host, staged, status);
        }

        let output = self.run(host, &install_script(&staged, path, perms)).await?;
        if !output.status.success() {
            bail!(
                "installing {} on {} failed: {}",
                path,
                host,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }
}
