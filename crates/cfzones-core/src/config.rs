//! Zone configuration
//!
//! This module defines the configuration tree (zones, domains, hosts,
//! aliases, services) and the loaders that build it from YAML documents,
//! files or environment variables.
//!
//! ```yaml
//! zones:
//!   - id: main
//!     domains:
//!       - id: com
//!         name: example.com
//!     hosts:
//!       - id: web
//!         name: web
//!         addresses:
//!           - id: v4
//!             value: 203.0.113.5
//!     aliases:
//!       - id: www
//!         name: www
//!         host: web.@
//!         proxied: true
//! ```
//!
//! Every loader validates the tree before returning it. Validation failures
//! are [`Error::Config`] and name the offending key, e.g.
//! `zones[0].domains[1].name: must not be empty`.

use crate::error::{Error, Result};
use crate::identity::identity;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::Path;

/// Environment variable holding an inline YAML or JSON zones document
pub const ZONES_ENV: &str = "CFZONES_ZONES";

/// Environment variable holding the path of a YAML zones file
pub const CONFIG_PATH_ENV: &str = "CFZONES_CONFIG";

/// Root of the configuration tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZonesConfig {
    /// Zones to declare, in order
    #[serde(default)]
    pub zones: Vec<Zone>,
}

impl ZonesConfig {
    /// Create a configuration from zones built in code
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    /// Parse and validate a YAML (or JSON) document
    pub fn from_yaml_str(document: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub async fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let document = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read zones file {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!("Loaded zones file {}", path.display());
        Self::from_yaml_str(&document)
    }

    /// Load from the process environment
    ///
    /// See [`ZonesConfig::from_env_with`].
    pub async fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok()).await
    }

    /// Load from key/value configuration bound at run time
    ///
    /// `CFZONES_ZONES` (an inline document) takes precedence over
    /// `CFZONES_CONFIG` (a file path). Having neither is a configuration
    /// error.
    pub async fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(document) = lookup(ZONES_ENV).filter(|s| !s.trim().is_empty()) {
            tracing::debug!("Loading zones from {}", ZONES_ENV);
            return Self::from_yaml_str(&document);
        }

        match lookup(CONFIG_PATH_ENV).filter(|s| !s.trim().is_empty()) {
            Some(path) => Self::from_yaml_file(path).await,
            None => Err(Error::config(format!(
                "No zone configuration: set {} to a YAML file or {} to an inline document",
                CONFIG_PATH_ENV, ZONES_ENV
            ))),
        }
    }

    /// Validate the configuration
    ///
    /// Checks required fields, address syntax, port ranges, zone id
    /// uniqueness and that no two resources of the same kind end up with the
    /// same identity.
    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(Error::config_field("zones", "at least one zone is required"));
        }

        let mut zone_ids = HashSet::new();
        for (i, zone) in self.zones.iter().enumerate() {
            let key = format!("zones[{}]", i);
            zone.validate(&key)?;
            if !zone_ids.insert(zone.id.as_str()) {
                return Err(Error::config_field(
                    format!("{}.id", key),
                    format!("duplicate zone id '{}'", zone.id),
                ));
            }
        }

        self.check_identities()
    }

    /// Number of zone declarations the configuration produces
    pub fn domain_count(&self) -> usize {
        self.zones.iter().map(|z| z.domains.len()).sum()
    }

    /// Reject identity collisions between resources of the same kind
    ///
    /// Identities are joined with a dash, so distinct ids such as `a-b`/`c`
    /// and `a`/`b-c` can still collide. Records of a zone are repeated once
    /// per domain, which never collides because the domain id differs.
    fn check_identities(&self) -> Result<()> {
        let mut zones: HashMap<String, String> = HashMap::new();
        let mut records: HashMap<String, String> = HashMap::new();

        for (zi, zone) in self.zones.iter().enumerate() {
            for (di, domain) in zone.domains.iter().enumerate() {
                let key = format!("zones[{}].domains[{}]", zi, di);
                claim(&mut zones, zone.domain_identity(domain), key)?;

                for (hi, host) in zone.hosts.iter().enumerate() {
                    for (ai, addr) in host.addresses.iter().enumerate() {
                        let key = format!("zones[{}].hosts[{}].addresses[{}]", zi, hi, ai);
                        claim(&mut records, zone.address_identity(domain, host, addr), key)?;
                    }
                }
                for (ai, alias) in zone.aliases.iter().enumerate() {
                    let key = format!("zones[{}].aliases[{}]", zi, ai);
                    claim(&mut records, zone.alias_identity(domain, alias), key)?;
                }
                for (si, service) in zone.services.iter().enumerate() {
                    let key = format!("zones[{}].services[{}]", zi, si);
                    claim(&mut records, zone.service_identity(domain, service), key)?;
                }
            }
        }

        Ok(())
    }
}

/// Declarer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeclarerConfig {
    /// Cloudflare API v4
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Account that owns newly created zones
        account_id: Option<String>,
        /// Perform lookups only and log the intended writes
        dry_run: bool,
    },

    /// In-memory recording declarer; prints the plan without touching a provider
    #[default]
    Plan,
}

impl DeclarerConfig {
    /// Validate the declarer configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            DeclarerConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            DeclarerConfig::Plan => Ok(()),
        }
    }

    /// Get the declarer type name
    pub fn type_name(&self) -> &'static str {
        match self {
            DeclarerConfig::Cloudflare { .. } => "cloudflare",
            DeclarerConfig::Plan => "plan",
        }
    }
}

fn claim(seen: &mut HashMap<String, String>, identity: String, key: String) -> Result<()> {
    if let Some(previous) = seen.get(&identity) {
        return Err(Error::config_field(
            key,
            format!("identity '{}' is already used by {}", identity, previous),
        ));
    }
    seen.insert(identity, key);
    Ok(())
}

fn unique_ids<'a>(ids: impl Iterator<Item = &'a str>, key: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for (i, id) in ids.enumerate() {
        if !seen.insert(id) {
            return Err(Error::config_field(
                format!("{}[{}].id", key, i),
                format!("duplicate id '{}'", id),
            ));
        }
    }
    Ok(())
}

fn require(value: &str, key: impl AsRef<str>) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::config_field(key, "must not be empty"));
    }
    Ok(())
}

/// A group of domains sharing the same records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Zone {
    /// Unique, human-readable identifier; first segment of every identity
    #[serde(default)]
    pub id: String,

    /// Zone security settings
    #[serde(default)]
    pub settings: ZoneSettingsConfig,

    /// Managed domains
    #[serde(default)]
    pub domains: Vec<Domain>,

    /// A/AAAA records
    #[serde(default)]
    pub hosts: Vec<Host>,

    /// CNAME records
    #[serde(default)]
    pub aliases: Vec<Alias>,

    /// SRV records
    #[serde(default)]
    pub services: Vec<Service>,
}

impl Zone {
    /// Create an empty zone
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Add a domain
    pub fn with_domain(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.domains.push(Domain {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// Add a host
    pub fn with_host(mut self, host: Host) -> Self {
        self.hosts.push(host);
        self
    }

    /// Add an alias
    pub fn with_alias(mut self, alias: Alias) -> Self {
        self.aliases.push(alias);
        self
    }

    /// Add a service
    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    /// Replace the zone settings
    pub fn with_settings(mut self, settings: ZoneSettingsConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Identity of the zone (and its settings) for one domain
    pub fn domain_identity(&self, domain: &Domain) -> String {
        identity([self.id.as_str(), domain.id.as_str()])
    }

    /// Identity of one host address record
    pub fn address_identity(&self, domain: &Domain, host: &Host, addr: &HostAddress) -> String {
        identity([
            self.id.as_str(),
            domain.id.as_str(),
            host.id.as_str(),
            addr.id.as_str(),
        ])
    }

    /// Identity of one alias record
    pub fn alias_identity(&self, domain: &Domain, alias: &Alias) -> String {
        identity([self.id.as_str(), domain.id.as_str(), alias.id.as_str()])
    }

    /// Identity of one service record
    pub fn service_identity(&self, domain: &Domain, service: &Service) -> String {
        identity([
            self.id.as_str(),
            domain.id.as_str(),
            service.name.as_str(),
            service.id.as_str(),
        ])
    }

    fn validate(&self, key: &str) -> Result<()> {
        require(&self.id, format!("{}.id", key))?;

        if self.domains.is_empty() {
            return Err(Error::config_field(
                format!("{}.domains", key),
                "at least one domain is required",
            ));
        }
        for (i, domain) in self.domains.iter().enumerate() {
            domain.validate(&format!("{}.domains[{}]", key, i))?;
        }
        for (i, host) in self.hosts.iter().enumerate() {
            host.validate(&format!("{}.hosts[{}]", key, i))?;
        }
        for (i, alias) in self.aliases.iter().enumerate() {
            alias.validate(&format!("{}.aliases[{}]", key, i))?;
        }
        for (i, service) in self.services.iter().enumerate() {
            service.validate(&format!("{}.services[{}]", key, i))?;
        }

        unique_ids(self.domains.iter().map(|d| d.id.as_str()), &format!("{}.domains", key))?;
        unique_ids(self.hosts.iter().map(|h| h.id.as_str()), &format!("{}.hosts", key))?;
        unique_ids(self.aliases.iter().map(|a| a.id.as_str()), &format!("{}.aliases", key))?;
        unique_ids(self.services.iter().map(|s| s.id.as_str()), &format!("{}.services", key))
    }
}

/// Zone security settings that may be tuned per zone
///
/// SSL mode `strict` and minimum TLS version 1.2 are always applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneSettingsConfig {
    /// Enable 0-RTT connection resumption; left untouched when unset
    #[serde(default)]
    pub zero_rtt: Option<bool>,

    /// Enable Universal SSL certificates
    #[serde(default = "default_universal_ssl")]
    pub universal_ssl: bool,
}

impl Default for ZoneSettingsConfig {
    fn default() -> Self {
        Self {
            zero_rtt: None,
            universal_ssl: default_universal_ssl(),
        }
    }
}

fn default_universal_ssl() -> bool {
    true
}

/// A managed DNS domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Domain {
    /// Identifier, second segment of every identity
    #[serde(default)]
    pub id: String,

    /// Registered domain name (e.g. `example.com`)
    #[serde(default)]
    pub name: String,
}

impl Domain {
    fn validate(&self, key: &str) -> Result<()> {
        require(&self.id, format!("{}.id", key))?;
        require(&self.name, format!("{}.name", key))
    }
}

/// Mapping from a subdomain to its addresses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Host {
    /// Identifier of the record group
    #[serde(default)]
    pub id: String,

    /// Subdomain name
    #[serde(default)]
    pub name: String,

    /// One A or AAAA record is declared per address
    #[serde(default)]
    pub addresses: Vec<HostAddress>,
}

impl Host {
    /// Create a host without addresses
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            addresses: Vec::new(),
        }
    }

    /// Add an address
    pub fn with_address(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.addresses.push(HostAddress {
            id: id.into(),
            value: value.into(),
        });
        self
    }

    fn validate(&self, key: &str) -> Result<()> {
        require(&self.id, format!("{}.id", key))?;
        require(&self.name, format!("{}.name", key))?;
        for (i, addr) in self.addresses.iter().enumerate() {
            addr.validate(&format!("{}.addresses[{}]", key, i))?;
        }
        unique_ids(self.addresses.iter().map(|a| a.id.as_str()), &format!("{}.addresses", key))
    }
}

/// One address of a host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostAddress {
    /// Identifier of the record
    #[serde(default)]
    pub id: String,

    /// IP address literal, declared as-is
    #[serde(default)]
    pub value: String,
}

impl HostAddress {
    fn validate(&self, key: &str) -> Result<()> {
        require(&self.id, format!("{}.id", key))?;
        require(&self.value, format!("{}.value", key))?;
        self.value.parse::<IpAddr>().map_err(|_| {
            Error::config_field(
                format!("{}.value", key),
                format!("'{}' is not an IP address", self.value),
            )
        })?;
        Ok(())
    }
}

/// A CNAME record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Alias {
    /// Identifier of the record
    #[serde(default)]
    pub id: String,

    /// Record name; empty means the zone apex (`@`)
    #[serde(default)]
    pub name: String,

    /// Target host; every `@` is replaced by the domain name
    #[serde(default)]
    pub host: String,

    /// Serve the record through the Cloudflare proxy
    #[serde(default)]
    pub proxied: bool,
}

impl Alias {
    /// Create an unproxied alias
    pub fn new(id: impl Into<String>, name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            host: host.into(),
            proxied: false,
        }
    }

    /// Set the proxy flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    fn validate(&self, key: &str) -> Result<()> {
        require(&self.id, format!("{}.id", key))?;
        require(&self.host, format!("{}.host", key))
    }
}

/// An SRV record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Service {
    /// Identifier of the record
    #[serde(default)]
    pub id: String,

    /// Service label (e.g. `_sip`)
    #[serde(default)]
    pub service: String,

    /// Protocol label (e.g. `_tcp`)
    #[serde(default)]
    pub proto: String,

    /// Owner name the service is published under (`@` for the apex)
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub prio: u16,

    #[serde(default)]
    pub weight: u16,

    /// Target host
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: u16,
}

impl Service {
    fn validate(&self, key: &str) -> Result<()> {
        require(&self.id, format!("{}.id", key))?;
        require(&self.service, format!("{}.service", key))?;
        require(&self.proto, format!("{}.proto", key))?;
        require(&self.name, format!("{}.name", key))?;
        require(&self.host, format!("{}.host", key))?;
        if self.port == 0 {
            return Err(Error::config_field(
                format!("{}.port", key),
                "must be between 1 and 65535",
            ));
        }
        Ok(())
    }
}
