//! Name normalization and the validation errors raised while building zones.
use hickory_proto::ProtoError;
use hickory_proto::rr::Name;
use regex::Regex;

use crate::records::CodecError;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("no nameserver in SOA record found for zone {0}")]
    MissingNameserver(String),
    #[error("no postmaster in SOA record found for zone {0}")]
    MissingPostmaster(String),
    #[error("invalid SOA name '{name}' in zone {zone}")]
    InvalidSoaName { zone: String, name: String },
    #[error("invalid zone name '{0}'")]
    InvalidZone(String),
    #[error("zone {0} has zone_type group, but no group defined")]
    MissingGroup(String),
    #[error("invalid owner name '{owner}' in zone {zone}")]
    InvalidOwner { zone: String, owner: String },
    #[error("invalid record at '{owner}' in zone {zone}: {source}")]
    InvalidRecord {
        zone: String,
        owner: String,
        #[source]
        source: CodecError,
    },
}

lazy_static::lazy_static! {
    /// A single owner label: letters, digits, '-', '_' or a lone wildcard.
    static ref LABEL_RE: Regex = Regex::new(r"^(\*|[A-Za-z0-9_-]{1,63})$").unwrap();
}

/// Append the root dot if `name` is not already absolute.
pub fn absolute_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.ends_with('.') {
        trimmed.to_string()
    } else {
        format!("{}.", trimmed)
    }
}

/// SOA rname form of a contact address: `hostmaster@example.org` becomes
/// `hostmaster.example.org.`.
pub fn postmaster_name(contact: &str) -> String {
    absolute_name(contact).replace('@', ".")
}

/// Absolute form of a zone name, as a [`Name`].
pub fn origin_name(zone: &str) -> Result<Name, ValidationError> {
    let invalid = || ValidationError::InvalidZone(zone.to_string());
    if !valid_labels(zone) {
        return Err(invalid());
    }
    Name::parse(&absolute_name(zone), None)
        .map(|name| name.to_lowercase())
        .map_err(|_| invalid())
}

/// Interpret `owner` relative to `origin` the way a master file does.
///
/// `@` and the empty string are the origin itself; absolute names are kept.
pub fn owner_name(owner: &str, origin: &Name) -> Result<Name, ProtoError> {
    match owner.trim() {
        "" | "@" => Ok(origin.clone()),
        owner => Name::parse(owner, Some(origin)).map(|name| name.to_lowercase()),
    }
}

/// Master-file text of `name`: relative to `origin` when it lies inside it,
/// `@` for the origin itself, absolute otherwise.
pub fn relative_text(name: &Name, origin: &Name) -> String {
    if name == origin {
        return "@".to_string();
    }
    let text = name.to_lowercase().to_ascii();
    if origin.is_root() {
        return text.trim_end_matches('.').to_string();
    }
    if origin.zone_of(name) {
        let suffix = format!(".{}", origin.to_lowercase().to_ascii());
        if let Some(prefix) = text.strip_suffix(&suffix) {
            return prefix.to_string();
        }
    }
    text
}

/// Key under which an owner is stored in a zone: relative to the origin,
/// the apex being the empty string.
pub fn owner_key(owner: &Name, origin: &Name) -> String {
    if owner == origin {
        String::new()
    } else {
        relative_text(owner, origin)
    }
}

/// Whether every label of `name` is a plain host label, `_`-prefixed
/// service label or wildcard. A single trailing dot is allowed.
pub fn valid_labels(name: &str) -> bool {
    let labels = name.strip_suffix('.').unwrap_or(name);
    !labels.is_empty() && name.len() <= 253 && labels.split('.').all(|l| LABEL_RE.is_match(l))
}

pub fn validate_owner_name(zone: &str, owner: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidOwner {
        zone: zone.to_string(),
        owner: owner.to_string(),
    };

    let trimmed = owner.trim();
    if trimmed.is_empty() || trimmed == "@" {
        return Ok(());
    }
    if !valid_labels(trimmed) {
        return Err(invalid());
    }

    Ok(())
}
