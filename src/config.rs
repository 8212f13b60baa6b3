//! Declarative CoreDNS deployment description, as read from JSON.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::records::RawRecord;

/// Records keyed by owner name.
pub type RecordMap = BTreeMap<String, Vec<RawRecord>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorednsConfig {
    #[serde(rename = "defaultDir")]
    pub default_dir: String,
    pub owner: String,
    pub group: String,
    /// Binary artifact source; `local:<path>` uploads a local file.
    pub url: String,
    pub snippets: BTreeMap<String, String>,
    pub servers: BTreeMap<String, ServerConfig>,
    /// Node inventory consulted for group zones.
    pub nodes: BTreeMap<String, NodeConfig>,
}

impl Default for CorednsConfig {
    fn default() -> Self {
        Self {
            default_dir: "/etc/coredns".into(),
            owner: "coredns".into(),
            group: "coredns".into(),
            url: String::new(),
            snippets: BTreeMap::new(),
            servers: BTreeMap::new(),
            nodes: BTreeMap::new(),
        }
    }
}

impl CorednsConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("failed to parse coredns configuration")
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn corefile_path(&self) -> String {
        format!("{}/Corefile", self.default_dir.trim_end_matches('/'))
    }

    /// Zone file directory for a server, unless the zone overrides it.
    pub fn server_zone_dir(&self, name: &str, server: &ServerConfig) -> String {
        server
            .zonefile_dir
            .clone()
            .unwrap_or_else(|| format!("{}/zones/{}", self.default_dir.trim_end_matches('/'), name))
    }

    pub fn enabled_servers(&self) -> impl Iterator<Item = (&String, &ServerConfig)> {
        self.servers.iter().filter(|(_, s)| s.enabled)
    }

    /// Members of `group`, ordered by node identity.
    pub fn nodes_in_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = (&'a String, &'a NodeConfig)> {
        self.nodes
            .iter()
            .filter(move |(_, node)| node.groups.iter().any(|g| g == group))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub port: Option<u16>,
    pub zonefile_dir: Option<String>,
    pub name_servers: Vec<String>,
    pub notify: Vec<String>,
    pub soa: SoaConfig,
    pub default_ttl: Option<u32>,
    /// Extra Corefile directives applied to every zone.
    pub config: BTreeMap<String, String>,
    pub template_records: RecordMap,
    pub zones: BTreeMap<String, ZoneConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: None,
            zonefile_dir: None,
            name_servers: Vec::new(),
            notify: Vec::new(),
            soa: SoaConfig::default(),
            default_ttl: None,
            config: BTreeMap::new(),
            template_records: RecordMap::new(),
            zones: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoaConfig {
    pub nameserver: Option<String>,
    pub hostmaster: Option<String>,
    pub refresh: Option<u32>,
    pub retry: Option<u32>,
    pub expire: Option<u32>,
    pub minimum: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneType {
    #[default]
    Standard,
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub enabled: bool,
    pub zonefile_dir: Option<String>,
    pub name_servers: Vec<String>,
    pub notify: Vec<String>,
    pub soa: SoaConfig,
    pub config: BTreeMap<String, String>,
    pub default_ttl: Option<u32>,
    pub zone_type: ZoneType,
    pub group: Option<String>,
    pub interfaces: BTreeMap<String, InterfaceConfig>,
    pub use_template_records: bool,
    pub records: RecordMap,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            zonefile_dir: None,
            name_servers: Vec::new(),
            notify: Vec::new(),
            soa: SoaConfig::default(),
            config: BTreeMap::new(),
            default_ttl: None,
            zone_type: ZoneType::Standard,
            group: None,
            interfaces: BTreeMap::new(),
            use_template_records: false,
            records: RecordMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Also point the bare node name at this interface's record.
    pub cname: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub hostname: String,
    pub groups: Vec<String>,
    pub interfaces: BTreeMap<String, NodeInterface>,
}

impl NodeConfig {
    pub fn first_ip(&self, interface: &str) -> Option<&str> {
        self.interfaces
            .get(interface)?
            .ip_addresses
            .first()
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInterface {
    pub ip_addresses: Vec<String>,
}
