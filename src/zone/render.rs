//! Canonical zone text: the on-disk format and the comparison key.
use std::fmt::Write as _;

use super::{CanonicalState, Zone};
use crate::records::rdata_text;

/// Full zone file: `$ORIGIN`/`$TTL` header, SOA, then every record.
pub fn render(zone: &Zone) -> String {
    let soa = &zone.soa;
    let mut out = String::new();

    let origin = zone.origin.to_ascii();
    let _ = writeln!(out, "$ORIGIN {}", origin);
    let _ = writeln!(out, "$TTL {}", zone.default_ttl);
    out.push('\n');
    let _ = writeln!(
        out,
        "{} IN SOA {} {} {} {} {} {} {}",
        origin,
        soa.mname.to_ascii(),
        soa.rname.to_ascii(),
        soa.serial,
        soa.refresh,
        soa.retry,
        soa.expire,
        soa.minimum
    );

    for line in record_lines(zone) {
        out.push_str(&line);
        out.push('\n');
    }

    out
}

/// Every non-SOA record as one origin-relative line, in zone order.
pub fn record_lines(zone: &Zone) -> Vec<String> {
    zone.record_sets()
        .flat_map(|(owner, set)| {
            let owner = if owner.is_empty() { "@" } else { owner };
            set.rdata.iter().map(move |rdata| {
                format!(
                    "{} {} {} {} {}",
                    owner,
                    set.ttl,
                    set.class(),
                    set.rtype,
                    rdata_text(rdata, &zone.origin)
                )
            })
        })
        .collect()
}

/// Comparison key for `zone`, without the serial.
pub fn to_state(zone: &Zone) -> CanonicalState {
    let mut records = record_lines(zone);
    records.sort();

    CanonicalState {
        zone_name: zone.origin.to_lowercase().to_ascii(),
        soa_mname: zone.soa.mname.to_lowercase().to_ascii(),
        soa_rname: zone.soa.rname.to_lowercase().to_ascii(),
        soa_refresh: zone.soa.refresh,
        soa_retry: zone.soa.retry,
        soa_expire: zone.soa.expire,
        soa_minimum: zone.soa.minimum,
        records,
    }
}
