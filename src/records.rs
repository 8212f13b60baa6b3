//! Record codec table: the fixed set of record types a zone may carry, and
//! how a configured value becomes typed record data.
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use hickory_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, PTR, SRV, TXT};
use hickory_proto::rr::{DNSClass, Name, RData};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::{absolute_name, relative_text, valid_labels};

/// Longest character-string a TXT record element may hold.
pub const TXT_CHUNK_MAX: usize = 255;

pub const DEFAULT_MX_PREFERENCE: u16 = 10;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("{0} record value must be a string")]
    ExpectedString(RecordType),
    #[error("{0} record value is empty")]
    Empty(RecordType),
    #[error("invalid {rtype} address '{value}'")]
    InvalidAddress { rtype: RecordType, value: String },
    #[error("invalid {rtype} target name '{value}'")]
    InvalidName { rtype: RecordType, value: String },
    #[error("SRV value must be [priority, weight, port, target]")]
    InvalidSrv,
    #[error("MX value must be {{preference, exchange}}")]
    InvalidMx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordType {
    Ns,
    A,
    Aaaa,
    Cname,
    Srv,
    Ptr,
    Txt,
    Mx,
}

impl RecordType {
    pub const ALL: [RecordType; 8] = [
        RecordType::Ns,
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Srv,
        RecordType::Ptr,
        RecordType::Txt,
        RecordType::Mx,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Ns => "NS",
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Srv => "SRV",
            RecordType::Ptr => "PTR",
            RecordType::Txt => "TXT",
            RecordType::Mx => "MX",
        }
    }

    /// Class/type pair record sets are grouped by.
    pub fn key(self) -> (DNSClass, RecordType) {
        (DNSClass::IN, self)
    }

    pub fn wire(self) -> hickory_proto::rr::RecordType {
        use hickory_proto::rr::RecordType as Wire;
        match self {
            RecordType::Ns => Wire::NS,
            RecordType::A => Wire::A,
            RecordType::Aaaa => Wire::AAAA,
            RecordType::Cname => Wire::CNAME,
            RecordType::Srv => Wire::SRV,
            RecordType::Ptr => Wire::PTR,
            RecordType::Txt => Wire::TXT,
            RecordType::Mx => Wire::MX,
        }
    }

    /// Codec type of a wire record type, `None` for types a zone here
    /// never carries.
    pub fn from_wire(rtype: hickory_proto::rr::RecordType) -> Option<Self> {
        RecordType::ALL.into_iter().find(|t| t.wire() == rtype)
    }

    /// Validate a configured value and encode it as record data.
    ///
    /// Names in the value are made absolute by appending the root; they are
    /// never read against the zone origin.
    pub fn encode(self, value: &Value) -> Result<RData, CodecError> {
        match self {
            RecordType::Ns => Ok(RData::NS(NS(host_name(self, name_value(self, value)?)?))),
            RecordType::Cname => Ok(RData::CNAME(CNAME(host_name(self, name_value(self, value)?)?))),
            RecordType::Ptr => Ok(RData::PTR(PTR(host_name(self, name_value(self, value)?)?))),
            RecordType::A => {
                let text = non_empty(self, value)?;
                let addr = Ipv4Addr::from_str(text).map_err(|_| CodecError::InvalidAddress {
                    rtype: self,
                    value: text.to_string(),
                })?;
                Ok(RData::A(A::from(addr)))
            }
            RecordType::Aaaa => {
                let text = non_empty(self, value)?;
                let addr = Ipv6Addr::from_str(text).map_err(|_| CodecError::InvalidAddress {
                    rtype: self,
                    value: text.to_string(),
                })?;
                Ok(RData::AAAA(AAAA::from(addr)))
            }
            RecordType::Srv => {
                let srv: SrvValue =
                    serde_json::from_value(value.clone()).map_err(|_| CodecError::InvalidSrv)?;
                let (priority, weight, port, target) = srv.into_parts();
                if target.trim().is_empty() {
                    return Err(CodecError::InvalidSrv);
                }
                let target = host_name(self, target.trim())?;
                Ok(RData::SRV(SRV::new(priority, weight, port, target)))
            }
            RecordType::Txt => {
                let text = value.as_str().ok_or(CodecError::ExpectedString(self))?;
                Ok(RData::TXT(TXT::new(split_txt(text, TXT_CHUNK_MAX))))
            }
            RecordType::Mx => {
                let mx: MxValue =
                    serde_json::from_value(value.clone()).map_err(|_| CodecError::InvalidMx)?;
                let (preference, exchange) = mx.into_parts();
                if exchange.trim().is_empty() {
                    return Err(CodecError::InvalidMx);
                }
                let exchange = host_name(self, exchange.trim())?;
                Ok(RData::MX(MX::new(preference, exchange)))
            }
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

/// One configured record as it appears under `records.<owner>[]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "type")]
    pub rtype: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl RawRecord {
    pub fn new(rtype: RecordType, value: impl Into<Value>) -> Self {
        Self {
            rtype: rtype.as_str().to_string(),
            value: value.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// `None` for tags outside the codec table.
    pub fn record_type(&self) -> Option<RecordType> {
        self.rtype.parse().ok()
    }
}

/// Master-file rdata text with names relative to `origin`.
pub fn rdata_text(rdata: &RData, origin: &Name) -> String {
    match rdata {
        RData::NS(NS(name)) | RData::CNAME(CNAME(name)) | RData::PTR(PTR(name)) => {
            relative_text(name, origin)
        }
        RData::A(addr) => addr.0.to_string(),
        RData::AAAA(addr) => addr.0.to_string(),
        RData::SRV(srv) => format!(
            "{} {} {} {}",
            srv.priority(),
            srv.weight(),
            srv.port(),
            relative_text(srv.target(), origin)
        ),
        RData::TXT(txt) => txt
            .txt_data()
            .iter()
            .map(|chunk| quote_txt(&String::from_utf8_lossy(chunk)))
            .collect::<Vec<_>>()
            .join(" "),
        RData::MX(mx) => format!("{} {}", mx.preference(), relative_text(mx.exchange(), origin)),
        other => other.to_string(),
    }
}

/// Split a TXT value into character-strings of at most `max_len` bytes,
/// after stripping surrounding whitespace and one layer of quotes.
pub fn split_txt(value: &str, max_len: usize) -> Vec<String> {
    let trimmed = value.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(trimmed);

    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in unquoted.chars() {
        if current.len() + ch.len_utf8() > max_len {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn quote_txt(chunk: &str) -> String {
    let mut out = String::with_capacity(chunk.len() + 2);
    out.push('"');
    for ch in chunk.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn non_empty(rtype: RecordType, value: &Value) -> Result<&str, CodecError> {
    let text = value
        .as_str()
        .ok_or(CodecError::ExpectedString(rtype))?
        .trim();
    if text.is_empty() {
        return Err(CodecError::Empty(rtype));
    }
    Ok(text)
}

fn name_value(rtype: RecordType, value: &Value) -> Result<&str, CodecError> {
    let name = non_empty(rtype, value)?;
    if name == "." {
        return Err(CodecError::Empty(rtype));
    }
    Ok(name)
}

/// Absolute name for a target written in a record value.
fn host_name(rtype: RecordType, text: &str) -> Result<Name, CodecError> {
    let invalid = || CodecError::InvalidName {
        rtype,
        value: text.to_string(),
    };
    if !valid_labels(text) {
        return Err(invalid());
    }
    Name::parse(&absolute_name(text), None)
        .map(|name| name.to_lowercase())
        .map_err(|_| invalid())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SrvValue {
    Tuple(u16, u16, u16, String),
    Fields {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
}

impl SrvValue {
    fn into_parts(self) -> (u16, u16, u16, String) {
        match self {
            SrvValue::Tuple(p, w, port, t) => (p, w, port, t),
            SrvValue::Fields {
                priority,
                weight,
                port,
                target,
            } => (priority, weight, port, target),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MxValue {
    Fields {
        #[serde(default)]
        preference: Option<u16>,
        exchange: String,
    },
    Exchange(String),
}

impl MxValue {
    fn into_parts(self) -> (u16, String) {
        match self {
            MxValue::Fields {
                preference,
                exchange,
            } => (preference.unwrap_or(DEFAULT_MX_PREFERENCE), exchange),
            MxValue::Exchange(exchange) => (DEFAULT_MX_PREFERENCE, exchange),
        }
    }
}
