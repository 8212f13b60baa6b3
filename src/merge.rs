//! Server → zone inheritance: flattens a server's defaults into each of its
//! zones. Pure data transformation, nothing is validated here.
use std::collections::BTreeMap;

use crate::config::{CorednsConfig, RecordMap, ServerConfig, SoaConfig, ZoneConfig};

/// Zone settings after server-level defaults have been applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedZone {
    pub name_servers: Vec<String>,
    pub notify: Vec<String>,
    pub soa: SoaConfig,
    pub config: BTreeMap<String, String>,
    pub default_ttl: Option<u32>,
    pub records: RecordMap,
}

impl SoaConfig {
    /// Field-by-field overlay: values set here win over `fallback`.
    pub fn overlay(&self, fallback: &SoaConfig) -> SoaConfig {
        SoaConfig {
            nameserver: self.nameserver.clone().or_else(|| fallback.nameserver.clone()),
            hostmaster: self.hostmaster.clone().or_else(|| fallback.hostmaster.clone()),
            refresh: self.refresh.or(fallback.refresh),
            retry: self.retry.or(fallback.retry),
            expire: self.expire.or(fallback.expire),
            minimum: self.minimum.or(fallback.minimum),
        }
    }
}

pub fn merge_zone(server: &ServerConfig, zone: &ZoneConfig) -> MergedZone {
    let records = if zone.use_template_records {
        overlay_map(&zone.records, &server.template_records)
    } else {
        zone.records.clone()
    };

    MergedZone {
        name_servers: overlay_list(&zone.name_servers, &server.name_servers),
        notify: overlay_list(&zone.notify, &server.notify),
        soa: zone.soa.overlay(&server.soa),
        config: overlay_map(&zone.config, &server.config),
        default_ttl: zone.default_ttl.or(server.default_ttl),
        records,
    }
}

/// Merged zones of every server, keyed by server then zone name.
pub fn merge_servers(config: &CorednsConfig) -> BTreeMap<String, BTreeMap<String, MergedZone>> {
    config
        .servers
        .iter()
        .map(|(name, server)| {
            let zones = server
                .zones
                .iter()
                .map(|(zone_name, zone)| (zone_name.clone(), merge_zone(server, zone)))
                .collect();
            (name.clone(), zones)
        })
        .collect()
}

/// Zone entries first, then server entries the zone does not already have.
fn overlay_list(zone: &[String], server: &[String]) -> Vec<String> {
    let mut merged = zone.to_vec();
    for item in server {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

fn overlay_map<V: Clone>(zone: &BTreeMap<String, V>, server: &BTreeMap<String, V>) -> BTreeMap<String, V> {
    let mut merged = server.clone();
    merged.extend(zone.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
