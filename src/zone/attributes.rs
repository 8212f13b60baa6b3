//! Flat per-zone attributes, and the builder that assembles them from merged
//! configuration and the node inventory.
use serde::Serialize;
use tracing::debug;

use crate::config::{CorednsConfig, RecordMap, ZoneConfig, ZoneType};
use crate::merge::{MergedZone, merge_zone};
use crate::records::{RawRecord, RecordType};
use crate::validation::{ValidationError, absolute_name, postmaster_name};

/// TTL of the apex NS records synthesized from the name server list.
pub const NS_RECORD_TTL: u32 = 86400;

/// `default_ttl` used when neither zone nor server configures one.
pub const CONFIG_DEFAULT_TTL: u32 = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SoaAttributes {
    pub nameserver: Option<String>,
    pub postmaster: Option<String>,
    pub refresh: Option<u32>,
    pub retry: Option<u32>,
    pub expire: Option<u32>,
    pub minimum: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneAttributes {
    pub zone_name: String,
    pub soa: SoaAttributes,
    pub default_ttl: Option<u32>,
    pub records: RecordMap,
    pub zonefile_directory: String,
    pub zonefile_filename: String,
}

impl ZoneAttributes {
    /// Path of the zone file on the target host.
    pub fn remote_path(&self) -> String {
        format!(
            "{}/{}",
            self.zonefile_directory.trim_end_matches('/'),
            self.zonefile_filename
        )
    }
}

/// Zone file name for `zone`, compatible with other zone file tooling.
pub fn zonefile_name(zone: &str) -> String {
    format!("db.{}", zone.trim_end_matches('.'))
}

/// Accumulates records per owner name in sorted owner order.
#[derive(Debug, Clone)]
pub struct ZoneAttributesBuilder {
    zone_name: String,
    soa: SoaAttributes,
    default_ttl: Option<u32>,
    records: RecordMap,
    zonefile_directory: String,
    zonefile_filename: String,
}

impl ZoneAttributesBuilder {
    pub fn new(zone_name: impl Into<String>, zonefile_directory: impl Into<String>) -> Self {
        let zone_name = zone_name.into();
        let mut records = RecordMap::new();
        records.insert(String::new(), Vec::new());
        Self {
            zonefile_filename: zonefile_name(&zone_name),
            zone_name,
            soa: SoaAttributes::default(),
            default_ttl: None,
            records,
            zonefile_directory: zonefile_directory.into(),
        }
    }

    pub fn soa(mut self, soa: SoaAttributes) -> Self {
        self.soa = soa;
        self
    }

    pub fn default_ttl(mut self, ttl: u32) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn zonefile_filename(mut self, filename: impl Into<String>) -> Self {
        self.zonefile_filename = filename.into();
        self
    }

    /// One apex NS record per name server.
    pub fn name_servers(mut self, name_servers: &[String]) -> Self {
        for ns in name_servers {
            self.push(
                "",
                RawRecord::new(RecordType::Ns, absolute_name(ns)).with_ttl(NS_RECORD_TTL),
            );
        }
        self
    }

    pub fn record(mut self, owner: &str, record: RawRecord) -> Self {
        self.push(owner, record);
        self
    }

    pub fn records(mut self, records: &RecordMap) -> Self {
        for (owner, items) in records {
            for item in items {
                self.push(owner, item.clone());
            }
        }
        self
    }

    /// A records (and optional CNAME aliases) for every interface of every
    /// member of the zone's group.
    pub fn group_members(
        mut self,
        zone: &ZoneConfig,
        inventory: &CorednsConfig,
    ) -> Result<Self, ValidationError> {
        if zone.zone_type != ZoneType::Group {
            return Ok(self);
        }
        let group = zone
            .group
            .as_deref()
            .ok_or_else(|| ValidationError::MissingGroup(self.zone_name.clone()))?;

        let zone_suffix = format!(".{}", self.zone_name.trim_end_matches('.'));

        for (node_id, node) in inventory.nodes_in_group(group) {
            let hostname = node.hostname.trim_end_matches('.');
            let short_name = hostname.strip_suffix(&zone_suffix).unwrap_or(hostname).to_string();
            for (interface, interface_config) in &zone.interfaces {
                let Some(ip) = node.first_ip(interface) else {
                    debug!(node = %node_id, interface = %interface, "no address on interface");
                    continue;
                };

                let owner = format!("{}.{}", interface, short_name);
                self.push(&owner, RawRecord::new(RecordType::A, ip));
                if interface_config.cname {
                    let target = format!("{}.{}", owner, absolute_name(&self.zone_name));
                    self.push(&short_name, RawRecord::new(RecordType::Cname, target));
                }
            }
        }

        Ok(self)
    }

    fn push(&mut self, owner: &str, record: RawRecord) {
        self.records.entry(owner.to_string()).or_default().push(record);
    }

    /// Finish with SOA names made absolute and the postmaster `@` rewritten.
    pub fn build(self) -> ZoneAttributes {
        let soa = SoaAttributes {
            nameserver: non_empty(self.soa.nameserver.as_deref()).map(absolute_name),
            postmaster: non_empty(self.soa.postmaster.as_deref()).map(postmaster_name),
            ..self.soa
        };

        ZoneAttributes {
            zone_name: self.zone_name,
            soa,
            default_ttl: self.default_ttl,
            records: self.records,
            zonefile_directory: self.zonefile_directory,
            zonefile_filename: self.zonefile_filename,
        }
    }
}

fn non_empty(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.trim().is_empty())
}

/// One zone file to converge: `<server>_<zone>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneItem {
    pub id: String,
    pub server: String,
    pub attributes: ZoneAttributes,
}

/// Attributes of every enabled zone on every enabled server.
///
/// Fails on the first group zone that names no group.
pub fn plan_zones(config: &CorednsConfig) -> Result<Vec<ZoneItem>, ValidationError> {
    let mut items = Vec::new();

    for (server_name, server) in config.enabled_servers() {
        let server_dir = config.server_zone_dir(server_name, server);

        for (zone_name, zone) in &server.zones {
            if zone_name.trim_end_matches('.').is_empty() || !zone.enabled {
                continue;
            }

            let merged = merge_zone(server, zone);
            let directory = zone.zonefile_dir.clone().unwrap_or_else(|| server_dir.clone());
            let attributes = zone_attributes(zone_name, zone, &merged, directory, config)?;

            items.push(ZoneItem {
                id: format!("{}_{}", server_name, zone_name),
                server: server_name.clone(),
                attributes,
            });
        }
    }

    Ok(items)
}

fn zone_attributes(
    zone_name: &str,
    zone: &ZoneConfig,
    merged: &MergedZone,
    directory: String,
    inventory: &CorednsConfig,
) -> Result<ZoneAttributes, ValidationError> {
    let soa = SoaAttributes {
        nameserver: merged
            .soa
            .nameserver
            .clone()
            .or_else(|| merged.name_servers.first().cloned()),
        postmaster: merged.soa.hostmaster.clone(),
        refresh: merged.soa.refresh,
        retry: merged.soa.retry,
        expire: merged.soa.expire,
        minimum: merged.soa.minimum,
    };

    let builder = ZoneAttributesBuilder::new(zone_name, directory)
        .soa(soa)
        .default_ttl(merged.default_ttl.unwrap_or(CONFIG_DEFAULT_TTL))
        .name_servers(&merged.name_servers)
        .group_members(zone, inventory)?
        .records(&merged.records);

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::config::{InterfaceConfig, NodeConfig, NodeInterface, ServerConfig, SoaConfig};
    use crate::zone::{build, to_state};
    use serde_json::json;

    fn node(hostname: &str, group: &str, eth0: Option<&str>) -> NodeConfig {
        let mut interfaces = BTreeMap::new();
        if let Some(ip) = eth0 {
            interfaces.insert(
                "eth0".to_string(),
                NodeInterface {
                    ip_addresses: vec![ip.to_string()],
                },
            );
        }
        NodeConfig {
            hostname: hostname.into(),
            groups: vec![group.into()],
            interfaces,
        }
    }

    fn group_zone(group: Option<&str>) -> ZoneConfig {
        ZoneConfig {
            zone_type: ZoneType::Group,
            group: group.map(str::to_string),
            interfaces: [("eth0".to_string(), InterfaceConfig { cname: true })].into(),
            ..Default::default()
        }
    }

    #[test]
    fn group_zone_without_group_fails() {
        let err = ZoneAttributesBuilder::new("example.org", "/zones")
            .group_members(&group_zone(None), &CorednsConfig::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingGroup(_)));
    }

    #[test]
    fn group_members_get_interface_records() {
        let mut inventory = CorednsConfig::default();
        inventory
            .nodes
            .insert("b-node".into(), node("web2.example.org", "web", Some("192.0.2.12")));
        inventory
            .nodes
            .insert("a-node".into(), node("web1.example.org", "web", Some("192.0.2.11")));
        inventory
            .nodes
            .insert("c-node".into(), node("web3.example.org", "web", None));
        inventory
            .nodes
            .insert("d-node".into(), node("db1.example.org", "db", Some("192.0.2.20")));

        let attrs = ZoneAttributesBuilder::new("example.org", "/zones")
            .group_members(&group_zone(Some("web")), &inventory)
            .unwrap()
            .build();

        assert_eq!(attrs.records["eth0.web1"][0].value, json!("192.0.2.11"));
        assert_eq!(attrs.records["eth0.web2"][0].value, json!("192.0.2.12"));
        assert_eq!(attrs.records["web1"][0].rtype, "CNAME");
        assert_eq!(attrs.records["web1"][0].value, json!("eth0.web1.example.org."));
        assert!(!attrs.records.contains_key("eth0.web3"));
        assert!(!attrs.records.contains_key("eth0.db1"));
    }

    #[test]
    fn group_cnames_point_inside_the_zone() {
        let mut inventory = CorednsConfig::default();
        inventory
            .nodes
            .insert("a-node".into(), node("web1.example.org", "web", Some("192.0.2.11")));

        let attrs = ZoneAttributesBuilder::new("example.org", "/zones")
            .soa(SoaAttributes {
                nameserver: Some("ns1.example.org".into()),
                postmaster: Some("hostmaster@example.org".into()),
                ..Default::default()
            })
            .default_ttl(300)
            .name_servers(&["ns1.example.org".to_string()])
            .group_members(&group_zone(Some("web")), &inventory)
            .unwrap()
            .build();

        let state = to_state(&build("example.org", &attrs).unwrap());
        assert_eq!(
            state.records,
            vec![
                "@ 86400 IN NS ns1",
                "eth0.web1 300 IN A 192.0.2.11",
                "web1 300 IN CNAME eth0.web1",
            ]
        );
    }

    #[test]
    fn build_normalizes_soa_names() {
        let attrs = ZoneAttributesBuilder::new("example.org", "/zones/")
            .soa(SoaAttributes {
                nameserver: Some("ns1.example.org".into()),
                postmaster: Some("hostmaster@example.org".into()),
                ..Default::default()
            })
            .build();

        assert_eq!(attrs.soa.nameserver.as_deref(), Some("ns1.example.org."));
        assert_eq!(attrs.soa.postmaster.as_deref(), Some("hostmaster.example.org."));
        assert_eq!(attrs.remote_path(), "/zones/db.example.org");
    }

    #[test]
    fn plan_zones_applies_config_defaults() {
        let mut cfg = CorednsConfig::default();
        let mut server = ServerConfig::default();
        server.zones.insert(
            "example.org".into(),
            ZoneConfig {
                name_servers: vec!["ns1.example.org".into(), "ns2.example.org".into()],
                soa: SoaConfig {
                    hostmaster: Some("hostmaster@example.org".into()),
                    ..Default::default()
                },
                records: [("www".to_string(), vec![RawRecord::new(RecordType::A, "203.0.113.5")])].into(),
                ..Default::default()
            },
        );
        server.zones.insert(
            "disabled.org".into(),
            ZoneConfig {
                enabled: false,
                ..Default::default()
            },
        );
        cfg.servers.insert("main".into(), server);
        cfg.servers.insert(
            "off".into(),
            ServerConfig {
                enabled: false,
                zones: [("other.org".to_string(), ZoneConfig::default())].into(),
                ..Default::default()
            },
        );

        let items = plan_zones(&cfg).unwrap();
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.id, "main_example.org");
        let attrs = &item.attributes;
        assert_eq!(attrs.default_ttl, Some(CONFIG_DEFAULT_TTL));
        assert_eq!(attrs.soa.nameserver.as_deref(), Some("ns1.example.org."));
        assert_eq!(attrs.remote_path(), "/etc/coredns/zones/main/db.example.org");

        let apex = &attrs.records[""];
        assert_eq!(apex.len(), 2);
        assert_eq!(apex[0].ttl, Some(NS_RECORD_TTL));
        assert_eq!(apex[1].value, json!("ns2.example.org."));
    }
}
