//! DNS record types and address classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// DNS record types declared by cfzones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Canonical name (alias) record
    Cname,
    /// Service locator record
    Srv,
}

impl RecordType {
    /// Wire name of the record type (e.g. `"AAAA"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Srv => "SRV",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Select A or AAAA for an address literal
///
/// Anything containing a colon is treated as IPv6, everything else as IPv4.
/// The literal is not validated here; the config loader rejects addresses
/// that do not parse.
pub fn classify(address: &str) -> RecordType {
    if address.contains(':') {
        RecordType::Aaaa
    } else {
        RecordType::A
    }
}

/// Select A or AAAA for an already parsed address
///
/// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) classify as AAAA here,
/// which agrees with [`classify`] on their textual form.
pub fn classify_parsed(address: &IpAddr) -> RecordType {
    match address {
        IpAddr::V4(_) => RecordType::A,
        IpAddr::V6(_) => RecordType::Aaaa,
    }
}
