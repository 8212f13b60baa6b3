//! In-memory zone model shared by the builder, the renderer and the parser.
pub mod attributes;
pub mod builder;
pub mod parse;
pub mod render;
pub mod serial;

use std::collections::BTreeMap;

use hickory_proto::rr::{DNSClass, Name, RData};
use serde::Serialize;

use crate::records::RecordType;

pub use attributes::{ZoneAttributes, ZoneAttributesBuilder};
pub use builder::build;
pub use parse::{ParseError, parse};
pub use render::{render, to_state};

pub const DEFAULT_REFRESH: u32 = 14400;
pub const DEFAULT_RETRY: u32 = 7200;
pub const DEFAULT_EXPIRE: u32 = 604800;
pub const DEFAULT_MINIMUM: u32 = 14400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Soa {
    pub mname: Name,
    pub rname: Name,
    pub serial: u64,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

/// Records sharing owner, class and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    pub rtype: RecordType,
    pub ttl: u32,
    pub rdata: Vec<RData>,
}

impl RecordSet {
    pub fn class(&self) -> DNSClass {
        self.rtype.key().0
    }

    /// Add `rdata` unless already present. The set keeps the lowest TTL
    /// it has been given. A CNAME set holds one record; a later CNAME
    /// replaces it.
    fn add(&mut self, rdata: RData, ttl: u32) {
        if self.rtype == RecordType::Cname {
            self.ttl = ttl;
            self.rdata = vec![rdata];
            return;
        }
        self.ttl = self.ttl.min(ttl);
        if !self.rdata.contains(&rdata) {
            self.rdata.push(rdata);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Absolute, lowercase zone name.
    pub origin: Name,
    pub default_ttl: u32,
    pub soa: Soa,
    /// Owner name relative to the origin (apex is `""`) to its record sets.
    nodes: BTreeMap<String, Vec<RecordSet>>,
}

impl Zone {
    pub fn new(origin: Name, soa: Soa, default_ttl: u32) -> Self {
        Self {
            origin,
            default_ttl,
            soa,
            nodes: BTreeMap::new(),
        }
    }

    /// Insert a record into the set for (`owner`, class, type).
    ///
    /// `owner` must already be an owner key (see [`crate::validation::owner_key`]).
    pub fn add(&mut self, owner: &str, rtype: RecordType, ttl: u32, rdata: RData) {
        let sets = self.nodes.entry(owner.to_string()).or_default();
        let key = rtype.key();
        match sets.iter_mut().find(|s| s.rtype.key() == key) {
            Some(set) => set.add(rdata, ttl),
            None => sets.push(RecordSet {
                rtype,
                ttl,
                rdata: vec![rdata],
            }),
        }
    }

    pub fn record_set(&self, owner: &str, rtype: RecordType) -> Option<&RecordSet> {
        self.nodes.get(owner)?.iter().find(|s| s.rtype == rtype)
    }

    /// All record sets in owner order, apex first.
    pub fn record_sets(&self) -> impl Iterator<Item = (&str, &RecordSet)> {
        self.nodes
            .iter()
            .flat_map(|(owner, sets)| sets.iter().map(move |s| (owner.as_str(), s)))
    }

    pub fn record_count(&self) -> usize {
        self.record_sets().map(|(_, s)| s.rdata.len()).sum()
    }

    pub fn has_apex_ns(&self) -> bool {
        self.record_set("", RecordType::Ns)
            .is_some_and(|s| !s.rdata.is_empty())
    }
}

/// Serial-free comparison key between desired and deployed zones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalState {
    pub zone_name: String,
    pub soa_mname: String,
    pub soa_rname: String,
    pub soa_refresh: u32,
    pub soa_retry: u32,
    pub soa_expire: u32,
    pub soa_minimum: u32,
    pub records: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use hickory_proto::rr::rdata::{A, CNAME};

    fn name(text: &str) -> Name {
        Name::parse(text, None).unwrap()
    }

    fn soa() -> Soa {
        Soa {
            mname: name("ns1.example.org."),
            rname: name("hostmaster.example.org."),
            serial: 1,
            refresh: DEFAULT_REFRESH,
            retry: DEFAULT_RETRY,
            expire: DEFAULT_EXPIRE,
            minimum: DEFAULT_MINIMUM,
        }
    }

    fn a(last: u8) -> RData {
        RData::A(A::from(Ipv4Addr::new(192, 0, 2, last)))
    }

    #[test]
    fn record_sets_merge_and_keep_lowest_ttl() {
        let mut zone = Zone::new(name("example.org."), soa(), 300);
        zone.add("www", RecordType::A, 300, a(1));
        zone.add("www", RecordType::A, 60, a(2));
        zone.add("www", RecordType::A, 300, a(1));

        let set = zone.record_set("www", RecordType::A).unwrap();
        assert_eq!(set.ttl, 60);
        assert_eq!(set.rdata.len(), 2);
        assert_eq!(set.class(), DNSClass::IN);
        assert_eq!(zone.record_count(), 2);
        assert!(!zone.has_apex_ns());
    }

    #[test]
    fn cname_sets_hold_a_single_target() {
        let mut zone = Zone::new(name("example.org."), soa(), 300);
        zone.add("ftp", RecordType::Cname, 60, RData::CNAME(CNAME(name("www.example.org."))));
        zone.add("ftp", RecordType::Cname, 300, RData::CNAME(CNAME(name("files.example.org."))));

        let set = zone.record_set("ftp", RecordType::Cname).unwrap();
        assert_eq!(set.rdata, vec![RData::CNAME(CNAME(name("files.example.org.")))]);
        assert_eq!(set.ttl, 300);
    }
}
