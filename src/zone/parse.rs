//! Reads master-file text back into a [`Zone`].
//!
//! Lexing and rdata parsing are hickory's zone file parser; this module
//! only folds its record sets into the zone model and checks that the
//! result is a usable zone.
use hickory_proto::rr::{RData, RecordSet, RecordType as WireType};
use hickory_proto::serialize::txt::Parser;

use super::{Soa, Zone};
use crate::records::RecordType;
use crate::validation::{origin_name, owner_key};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("zone has no SOA record")]
    NoSoa,
    #[error("zone has no NS records at its apex")]
    NoNs,
    #[error("invalid zone name '{0}'")]
    InvalidOrigin(String),
    #[error("SOA owner {0} is not the zone apex")]
    MisplacedSoa(String),
    #[error("unsupported {rtype} record at '{owner}'")]
    Unsupported { owner: String, rtype: String },
    #[error("SOA timer {0} out of range")]
    SoaTimer(String),
    #[error("$INCLUDE is not allowed in a deployed zone file")]
    Include,
    #[error("{0}")]
    Syntax(String),
}

/// Parse `text` as the zone `zone_name`.
///
/// Text without an SOA or without apex NS records is rejected with
/// [`ParseError::NoSoa`] / [`ParseError::NoNs`]; callers treat those as
/// "nothing deployed". The returned zone's default TTL is the SOA minimum.
pub fn parse(text: &str, zone_name: &str) -> Result<Zone, ParseError> {
    let origin =
        origin_name(zone_name).map_err(|_| ParseError::InvalidOrigin(zone_name.to_string()))?;
    if text
        .lines()
        .any(|line| line.trim_start().to_ascii_uppercase().starts_with("$INCLUDE"))
    {
        return Err(ParseError::Include);
    }
    let (_, sets) = Parser::new(text, None, Some(origin.clone()))
        .parse()
        .map_err(|err| ParseError::Syntax(err.to_string()))?;

    let soa = sets
        .values()
        .flat_map(RecordSet::records_without_rrsigs)
        .find_map(|record| match record.data() {
            RData::SOA(soa) => Some((record.name(), soa)),
            _ => None,
        });
    let Some((apex, soa)) = soa else {
        return Err(ParseError::NoSoa);
    };
    if *apex != origin {
        return Err(ParseError::MisplacedSoa(apex.to_ascii()));
    }

    let soa = Soa {
        mname: soa.mname().to_lowercase(),
        rname: soa.rname().to_lowercase(),
        serial: u64::from(soa.serial()),
        refresh: timer(soa.refresh(), "refresh")?,
        retry: timer(soa.retry(), "retry")?,
        expire: timer(soa.expire(), "expire")?,
        minimum: soa.minimum(),
    };

    let mut zone = Zone::new(origin.clone(), soa.clone(), soa.minimum);
    for record in sets.values().flat_map(RecordSet::records_without_rrsigs) {
        let wire = record.record_type();
        if wire == WireType::SOA {
            continue;
        }
        let owner = owner_key(&record.name().to_lowercase(), &origin);
        let rtype = RecordType::from_wire(wire).ok_or_else(|| ParseError::Unsupported {
            owner: owner.clone(),
            rtype: wire.to_string(),
        })?;
        zone.add(&owner, rtype, record.ttl(), record.data().clone());
    }

    if !zone.has_apex_ns() {
        return Err(ParseError::NoNs);
    }

    Ok(zone)
}

fn timer(value: impl TryInto<u32>, name: &str) -> Result<u32, ParseError> {
    value
        .try_into()
        .map_err(|_| ParseError::SoaTimer(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::to_state;

    const HAND_EDITED: &str = r#"
; managed by hand
$TTL 1h
$ORIGIN example.org.
@   IN  SOA ns1 hostmaster (
        2024010101 ; serial
        4h 2h 1w 4h )
    86400 IN NS ns1.example.org.
    86400 IN NS ns2.example.net.
WWW   3600  A       203.0.113.5
mail  300   IN MX   10 mail.example.org.
txt   3600  TXT     "hello; world" "second \"part\""
"#;

    #[test]
    fn parses_hand_edited_zone() {
        let zone = parse(HAND_EDITED, "example.org").unwrap();

        assert_eq!(zone.default_ttl, 14400);
        assert_eq!(zone.soa.mname.to_ascii(), "ns1.example.org.");
        assert_eq!(zone.soa.rname.to_ascii(), "hostmaster.example.org.");
        assert_eq!(zone.soa.serial, 2024010101);
        assert_eq!(zone.soa.refresh, 14400);
        assert_eq!(zone.soa.expire, 604800);

        let ns = zone.record_set("", RecordType::Ns).unwrap();
        assert_eq!(ns.rdata.len(), 2);
        assert_eq!(ns.ttl, 86400);

        let state = to_state(&zone);
        assert!(state.records.contains(&"www 3600 IN A 203.0.113.5".to_string()));
        assert!(state.records.contains(&"mail 300 IN MX 10 mail".to_string()));
        assert!(state.records.contains(&r#"txt 3600 IN TXT "hello; world" "second \"part\"""#.to_string()));
    }

    #[test]
    fn missing_soa_or_ns_is_reported() {
        let no_soa = "$TTL 60\n@ IN NS ns1.example.org.\n";
        assert_eq!(parse(no_soa, "example.org."), Err(ParseError::NoSoa));

        let no_ns = "$TTL 60\n@ IN SOA ns1 hostmaster 1 2 3 4 5\nwww IN A 192.0.2.1\n";
        assert_eq!(parse(no_ns, "example.org."), Err(ParseError::NoNs));

        assert_eq!(parse("", "example.org."), Err(ParseError::NoSoa));
    }

    #[test]
    fn soa_must_sit_at_the_apex() {
        let text = "$TTL 60\nsub IN SOA ns1 hostmaster 1 2 3 4 5\n@ IN NS ns1\n";
        assert!(matches!(parse(text, "example.org."), Err(ParseError::MisplacedSoa(_))));
    }

    #[test]
    fn malformed_text_is_a_syntax_error() {
        let text = "$TTL 60\n@ IN SOA ns1 hostmaster 1 2 3 4 5\nwww IN A not-an-ip\n";
        assert!(matches!(parse(text, "example.org."), Err(ParseError::Syntax(_))));

        assert!(matches!(
            parse("this is not a zone file (", "example.org."),
            Err(ParseError::Syntax(_))
        ));
    }

    #[test]
    fn includes_are_never_followed() {
        let text = "$TTL 60\n@ IN SOA ns1 hostmaster 1 2 3 4 5\n@ IN NS ns1\n$INCLUDE /etc/passwd\n";
        assert_eq!(parse(text, "example.org."), Err(ParseError::Include));
    }

    #[test]
    fn types_outside_the_codec_table_are_refused() {
        let text = "$TTL 60\n@ IN SOA ns1 hostmaster 1 2 3 4 5\n@ IN NS ns1\n@ IN HINFO \"x\" \"y\"\n";
        assert!(matches!(
            parse(text, "example.org."),
            Err(ParseError::Unsupported { .. })
        ));
    }
}
