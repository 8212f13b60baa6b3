#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::bail;
use async_trait::async_trait;
use zonedeploy::{CorednsConfig, FilePerms, Transport};

/// In-memory target hosts that count every call.
#[derive(Default)]
pub struct MemoryTransport {
    files: Mutex<HashMap<(String, String), (Vec<u8>, FilePerms)>>,
    pub calls: AtomicUsize,
    pub writes: AtomicUsize,
    pub unreachable: AtomicBool,
    /// Paths containing this text make `exists` panic.
    pub panics_on: Mutex<Option<String>>,
}

impl MemoryTransport {
    pub fn put(&self, host: &str, path: &str, contents: &str) {
        self.files.lock().unwrap().insert(
            (host.to_string(), path.to_string()),
            (contents.as_bytes().to_vec(), FilePerms::zonefile()),
        );
    }

    pub fn get(&self, host: &str, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&(host.to_string(), path.to_string()))
            .map(|(bytes, _)| String::from_utf8(bytes.clone()).unwrap())
    }

    pub fn perms(&self, host: &str, path: &str) -> Option<FilePerms> {
        self.files
            .lock()
            .unwrap()
            .get(&(host.to_string(), path.to_string()))
            .map(|(_, perms)| perms.clone())
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn exists(&self, host: &str, path: &str) -> anyhow::Result<bool> {
        self.check()?;
        let panics_on = self.panics_on.lock().unwrap().clone();
        if panics_on.is_some_and(|part| path.contains(&part)) {
            panic!("transport bug on {path}");
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .contains_key(&(host.to_string(), path.to_string())))
    }

    async fn fetch(&self, host: &str, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.check()?;
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(&(host.to_string(), path.to_string()))
            .map(|(bytes, _)| bytes.clone()))
    }

    async fn deploy(&self, host: &str, source: &Path, path: &str, perms: &FilePerms) -> anyhow::Result<()> {
        self.check()?;
        let bytes = tokio::fs::read(source).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .insert((host.to_string(), path.to_string()), (bytes, perms.clone()));
        Ok(())
    }
}

pub fn example_config() -> CorednsConfig {
    CorednsConfig::from_json(
        r#"{
            "servers": {
                "main": {
                    "soa": {"hostmaster": "hostmaster@example.org"},
                    "zones": {
                        "example.org": {
                            "name_servers": ["ns1.example.org"],
                            "records": {
                                "www": [{"type": "A", "value": "203.0.113.5"}]
                            }
                        }
                    }
                }
            }
        }"#,
    )
    .unwrap()
}
