//! Convergence engine: build the desired zone, read what is deployed,
//! compare the canonical forms and write only when they differ.
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::ConvergeError;
use crate::remote::read_state;
use crate::transport::{FilePerms, Transport};
use crate::zone::attributes::ZoneItem;
use crate::zone::{CanonicalState, ZoneAttributes, build, render, to_state};

/// Desired vs deployed, for one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    Match,
    Diverged,
}

impl ZoneState {
    pub fn compare(desired: &CanonicalState, actual: Option<&CanonicalState>) -> Self {
        if actual == Some(desired) {
            ZoneState::Match
        } else {
            ZoneState::Diverged
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Unchanged,
    Written,
    /// Diverged, but nothing was written because of dry-run mode.
    WouldWrite,
}

impl Outcome {
    pub fn changed(self) -> bool {
        self != Outcome::Unchanged
    }
}

/// One async mutex per (host, path), so a file is never converged twice at
/// the same time.
#[derive(Debug, Default)]
pub struct PathLocks {
    inner: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl PathLocks {
    pub fn lock_for(&self, host: &str, path: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry((host.to_string(), path.to_string()))
            .or_default()
            .clone()
    }
}

pub struct Converger {
    transport: Arc<dyn Transport>,
    locks: PathLocks,
    zone_perms: FilePerms,
    dry_run: bool,
}

impl Converger {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            locks: PathLocks::default(),
            zone_perms: FilePerms::zonefile(),
            dry_run: false,
        }
    }

    pub fn with_zone_perms(mut self, perms: FilePerms) -> Self {
        self.zone_perms = perms;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Bring the zone file for `attributes` on `host` up to date.
    ///
    /// Invalid attributes fail before the host is contacted. A zone that
    /// already matches causes no writes.
    pub async fn converge_zone(
        &self,
        host: &str,
        attributes: &ZoneAttributes,
    ) -> Result<Outcome, ConvergeError> {
        let zone = build(&attributes.zone_name, attributes)?;
        let desired = to_state(&zone);
        let path = attributes.remote_path();

        let lock = self.locks.lock_for(host, &path);
        let _guard = lock.lock().await;

        let actual = read_state(self.transport.as_ref(), host, &path, &attributes.zone_name).await?;
        if ZoneState::compare(&desired, actual.as_ref()) == ZoneState::Match {
            debug!(host, zone = %zone.origin, path = %path, "zone file up to date");
            return Ok(Outcome::Unchanged);
        }

        if self.dry_run {
            info!(host, zone = %zone.origin, path = %path, "zone file differs (dry run)");
            return Ok(Outcome::WouldWrite);
        }

        self.write(host, &path, render(&zone).as_bytes(), &self.zone_perms)
            .await?;
        info!(host, zone = %zone.origin, path = %path, records = zone.record_count(), "zone file written");
        Ok(Outcome::Written)
    }

    /// Converge a file whose desired bytes are known, comparing byte for byte.
    pub async fn converge_file(
        &self,
        host: &str,
        path: &str,
        contents: &str,
        perms: &FilePerms,
    ) -> Result<Outcome, ConvergeError> {
        let lock = self.locks.lock_for(host, path);
        let _guard = lock.lock().await;

        let current = self
            .transport
            .fetch(host, path)
            .await
            .map_err(ConvergeError::transport)?;
        if current.as_deref() == Some(contents.as_bytes()) {
            debug!(host, path, "file up to date");
            return Ok(Outcome::Unchanged);
        }

        if self.dry_run {
            info!(host, path, "file differs (dry run)");
            return Ok(Outcome::WouldWrite);
        }

        self.write(host, path, contents.as_bytes(), perms).await?;
        info!(host, path, "file written");
        Ok(Outcome::Written)
    }

    /// Converge every zone concurrently; one zone failing does not stop the others.
    ///
    /// A zone whose task panics is reported as failed like any other error.
    pub async fn converge_all(self: &Arc<Self>, host: &str, items: Vec<ZoneItem>) -> ConvergeReport {
        let mut pending = BTreeMap::new();
        let mut tasks = JoinSet::new();
        for item in items {
            pending.insert(item.id.clone(), item.attributes.remote_path());
            let this = Arc::clone(self);
            let host = host.to_string();
            tasks.spawn(async move {
                let result = this.converge_zone(&host, &item.attributes).await;
                ReportEntry {
                    id: item.id,
                    path: item.attributes.remote_path(),
                    result,
                }
            });
        }

        let mut report = ConvergeReport::default();
        let mut task_errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => {
                    pending.remove(&entry.id);
                    report.entries.push(entry);
                }
                Err(err) => {
                    error!("zone convergence task failed: {err}");
                    task_errors.push(err.to_string());
                }
            }
        }
        for (id, path) in pending {
            report.push(id, path, Err(ConvergeError::task(task_errors.join("; "))));
        }
        report.entries.sort_by(|a, b| a.id.cmp(&b.id));
        report
    }

    /// Stage `contents` in a local temporary file, deploy it, then remove it.
    async fn write(
        &self,
        host: &str,
        path: &str,
        contents: &[u8],
        perms: &FilePerms,
    ) -> Result<(), ConvergeError> {
        let mut staged = tempfile::NamedTempFile::new()?;
        staged.write_all(contents)?;
        staged.as_file().sync_all()?;

        self.transport
            .deploy(host, staged.path(), path, perms)
            .await
            .map_err(ConvergeError::transport)?;

        staged.close()?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct ReportEntry {
    pub id: String,
    pub path: String,
    pub result: Result<Outcome, ConvergeError>,
}

#[derive(Debug, Default)]
pub struct ConvergeReport {
    pub entries: Vec<ReportEntry>,
}

impl ConvergeReport {
    pub fn push(&mut self, id: impl Into<String>, path: impl Into<String>, result: Result<Outcome, ConvergeError>) {
        self.entries.push(ReportEntry {
            id: id.into(),
            path: path.into(),
            result,
        });
    }

    pub fn changed(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.result, Ok(outcome) if outcome.changed()))
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.result.is_err())
    }

    /// True when any zone file or the Corefile changed, so the service has
    /// to reload its data.
    pub fn needs_service_restart(&self) -> bool {
        self.changed().next().is_some()
    }
}
