//! Declarative resource requests
//!
//! A [`ResourceRequest`] describes the desired end state of one resource:
//! a zone, the security settings of a zone, or a DNS record. Requests are
//! produced by the mapper and handed, one at a time, to a
//! [`ResourceDeclarer`](crate::traits::ResourceDeclarer).

use crate::config::ZoneSettingsConfig;
use crate::record_type::RecordType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// SSL mode applied to every zone
pub const SSL_MODE: &str = "strict";

/// Minimum TLS version applied to every zone
pub const MIN_TLS_VERSION: &str = "1.2";

/// Kind of a declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A DNS zone for one registered domain
    Zone,
    /// Security settings of a zone
    ZoneSettings,
    /// A single record inside a zone
    DnsRecord,
}

impl ResourceKind {
    /// Wire name of the kind (`zone`, `zone_settings`, `dns_record`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Zone => "zone",
            ResourceKind::ZoneSettings => "zone_settings",
            ResourceKind::DnsRecord => "dns_record",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zone security settings to enforce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSettings {
    /// SSL/TLS encryption mode
    pub ssl: String,
    /// Lowest TLS version accepted by the edge
    pub min_tls_version: String,
    /// Whether Universal SSL certificates are issued
    pub universal_ssl: bool,
    /// `None` leaves the provider's current value untouched
    pub zero_rtt: Option<bool>,
}

impl ZoneSettings {
    /// Strict SSL and TLS 1.2 plus the tunable flags of the zone
    pub fn hardened(config: &ZoneSettingsConfig) -> Self {
        Self {
            ssl: SSL_MODE.to_string(),
            min_tls_version: MIN_TLS_VERSION.to_string(),
            universal_ssl: config.universal_ssl,
            zero_rtt: config.zero_rtt,
        }
    }
}

/// SRV record payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvData {
    /// Service label, e.g. `_sip`
    pub service: String,
    /// Protocol label, e.g. `_tcp`
    pub proto: String,
    /// Owner name relative to the zone (`@` for the apex)
    pub name: String,
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    /// Host name providing the service
    pub target: String,
}

/// Value of a DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordValue {
    /// Plain content (address literal or CNAME target)
    Content(String),
    /// Structured SRV data
    Srv(SrvData),
}

/// A DNS record inside a declared zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Identifier assigned to the owning zone by the declarer
    pub zone_id: String,
    /// Registered name of the owning zone (e.g. `example.com`)
    pub zone_name: String,
    /// Record name relative to the zone, `@` for the apex
    pub name: String,
    pub record_type: RecordType,
    pub value: RecordValue,
    pub proxied: bool,
}

impl DnsRecord {
    /// Fully qualified owner name of the record
    ///
    /// SRV records are published under `_service._proto.name`.
    pub fn fqdn(&self) -> String {
        let base = qualify(&self.name, &self.zone_name);
        match &self.value {
            RecordValue::Srv(srv) => format!("{}.{}.{}", srv.service, srv.proto, base),
            RecordValue::Content(_) => base,
        }
    }
}

/// Qualify a zone-relative name (`@`, `www`, or an already qualified name)
pub fn qualify(name: &str, zone_name: &str) -> String {
    if name.is_empty() || name == "@" || name == zone_name {
        zone_name.to_string()
    } else if name.ends_with(&format!(".{}", zone_name)) {
        name.to_string()
    } else {
        format!("{}.{}", name, zone_name)
    }
}

/// What a request declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    Zone { name: String },
    ZoneSettings { zone_id: String, settings: ZoneSettings },
    DnsRecord(DnsRecord),
}

/// One declarative resource request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Stable identity used to track the resource across runs
    pub identity: String,
    pub spec: ResourceSpec,
}

impl ResourceRequest {
    /// Request a zone for a registered domain name
    pub fn zone(identity: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            spec: ResourceSpec::Zone { name: name.into() },
        }
    }

    /// Request security settings for an already declared zone
    pub fn zone_settings(
        identity: impl Into<String>,
        zone_id: impl Into<String>,
        settings: ZoneSettings,
    ) -> Self {
        Self {
            identity: identity.into(),
            spec: ResourceSpec::ZoneSettings {
                zone_id: zone_id.into(),
                settings,
            },
        }
    }

    /// Request a DNS record
    pub fn dns_record(identity: impl Into<String>, record: DnsRecord) -> Self {
        Self {
            identity: identity.into(),
            spec: ResourceSpec::DnsRecord(record),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match &self.spec {
            ResourceSpec::Zone { .. } => ResourceKind::Zone,
            ResourceSpec::ZoneSettings { .. } => ResourceKind::ZoneSettings,
            ResourceSpec::DnsRecord(_) => ResourceKind::DnsRecord,
        }
    }

    /// Zone identifier the request depends on, if any
    pub fn zone_id(&self) -> Option<&str> {
        match &self.spec {
            ResourceSpec::Zone { .. } => None,
            ResourceSpec::ZoneSettings { zone_id, .. } => Some(zone_id),
            ResourceSpec::DnsRecord(record) => Some(&record.zone_id),
        }
    }

    /// Flat field map of the request, as an orchestration engine sees it
    pub fn fields(&self) -> Map<String, Value> {
        let value = match &self.spec {
            ResourceSpec::Zone { name } => json!({ "zone": name }),
            ResourceSpec::ZoneSettings { zone_id, settings } => {
                let mut fields = json!({
                    "zone_id": zone_id,
                    "ssl": settings.ssl,
                    "min_tls_version": settings.min_tls_version,
                    "universal_ssl": on_off(settings.universal_ssl),
                });
                if let Some(zero_rtt) = settings.zero_rtt {
                    fields["0rtt"] = json!(on_off(zero_rtt));
                }
                fields
            }
            ResourceSpec::DnsRecord(record) => {
                let mut fields = json!({
                    "zone_id": record.zone_id,
                    "name": record.name,
                    "type": record.record_type.as_str(),
                    "proxied": record.proxied,
                });
                match &record.value {
                    RecordValue::Content(content) => fields["value"] = json!(content),
                    RecordValue::Srv(srv) => fields["data"] = json!(srv),
                }
                fields
            }
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// Cloudflare's spelling of boolean zone settings
pub fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Result of a successful declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declared {
    /// Identity of the request this answers
    pub identity: String,
    pub kind: ResourceKind,
    /// Identifier assigned by the declarer (zone id, record id, ...)
    pub id: String,
    pub outcome: DeclareOutcome,
}

/// What the declarer had to do to reach the desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclareOutcome {
    /// The resource did not exist and was created
    Created,
    /// The resource existed and was changed
    Updated,
    /// The resource already matched
    Unchanged,
    /// Dry run: the change was computed but not applied
    Planned,
}
