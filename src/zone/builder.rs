use hickory_proto::rr::Name;
use tracing::warn;

use super::serial::current_serial;
use super::{DEFAULT_EXPIRE, DEFAULT_MINIMUM, DEFAULT_REFRESH, DEFAULT_RETRY, Soa, Zone, ZoneAttributes};
use crate::validation::{
    ValidationError, absolute_name, origin_name, owner_key, owner_name, validate_owner_name,
};

/// Default TTL of a zone whose attributes carry none.
pub const DEFAULT_TTL: u32 = 60;

/// Build the zone described by `attributes`, stamped with the current serial.
pub fn build(zone_name: &str, attributes: &ZoneAttributes) -> Result<Zone, ValidationError> {
    build_with_serial(zone_name, attributes, current_serial())
}

pub fn build_with_serial(
    zone_name: &str,
    attributes: &ZoneAttributes,
    serial: u64,
) -> Result<Zone, ValidationError> {
    let origin = origin_name(zone_name)?;
    let zone = origin.to_ascii();
    let soa_attrs = &attributes.soa;

    let mname = soa_attrs
        .nameserver
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ValidationError::MissingNameserver(zone.clone()))?;
    let rname = soa_attrs
        .postmaster
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ValidationError::MissingPostmaster(zone.clone()))?;

    let soa = Soa {
        mname: soa_name(&zone, mname)?,
        rname: soa_name(&zone, rname)?,
        serial,
        refresh: soa_attrs.refresh.unwrap_or(DEFAULT_REFRESH),
        retry: soa_attrs.retry.unwrap_or(DEFAULT_RETRY),
        expire: soa_attrs.expire.unwrap_or(DEFAULT_EXPIRE),
        minimum: soa_attrs.minimum.unwrap_or(DEFAULT_MINIMUM),
    };

    let default_ttl = attributes.default_ttl.unwrap_or(DEFAULT_TTL);
    let mut built = Zone::new(origin.clone(), soa, default_ttl);

    for (owner, records) in &attributes.records {
        validate_owner_name(&zone, owner)?;
        let absolute = owner_name(owner, &origin).map_err(|_| ValidationError::InvalidOwner {
            zone: zone.clone(),
            owner: owner.clone(),
        })?;
        let key = owner_key(&absolute, &origin);

        for raw in records {
            let Some(rtype) = raw.record_type() else {
                warn!(zone = %zone, owner = %owner, rtype = %raw.rtype, "skipping unsupported record type");
                continue;
            };

            let rdata = rtype
                .encode(&raw.value)
                .map_err(|source| ValidationError::InvalidRecord {
                    zone: zone.clone(),
                    owner: owner.clone(),
                    source,
                })?;
            built.add(&key, rtype, raw.ttl.unwrap_or(default_ttl), rdata);
        }
    }

    Ok(built)
}

fn soa_name(zone: &str, text: &str) -> Result<Name, ValidationError> {
    Name::parse(&absolute_name(text), None)
        .map(|name| name.to_lowercase())
        .map_err(|_| ValidationError::InvalidSoaName {
            zone: zone.to_string(),
            name: text.to_string(),
        })
}
