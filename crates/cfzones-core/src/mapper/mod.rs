//! Zone and record declaration mapper
//!
//! Walks the configuration tree and hands one [`ResourceRequest`] at a time
//! to a [`ResourceDeclarer`]:
//!
//! ```text
//! Zone ──┬── Domain ──┬── zone              (main-com)
//!        │            ├── zone settings     (main-com)
//!        │            ├── A/AAAA per host address   (main-com-web-v4)
//!        │            ├── CNAME per alias           (main-com-www)
//!        │            └── SRV per service           (main-com-@-sip)
//!        └── Domain ── ...
//! ```
//!
//! Hosts, aliases and services belong to the zone and are declared once for
//! every domain of the zone.
//!
//! ## Ordering
//!
//! The zone of a domain is declared first; its identifier, as returned by the
//! declarer, is what the settings and record requests reference. Settings
//! follow immediately, then hosts, aliases and services.
//!
//! ## Failure
//!
//! The first failing declaration aborts the walk and its error is returned
//! unchanged. Nothing already declared is rolled back.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::{Alias, Domain, Host, HostAddress, Service, Zone};
use crate::declaration::{
    DeclareOutcome, Declared, DnsRecord, RecordValue, ResourceKind, ResourceRequest, SrvData,
    ZoneSettings,
};
use crate::error::{Error, Result};
use crate::outputs::{Outputs, ZONE_IDS};
use crate::record_type::{RecordType, classify};
use crate::traits::ResourceDeclarer;

/// Record name used for the zone apex
pub const APEX: &str = "@";

/// Placeholder in alias targets replaced by the domain name
pub const DOMAIN_PLACEHOLDER: &str = "@";

/// Explicit state threaded through every mapping function
///
/// Holds the declarer requests go to, the outputs exported so far and a
/// tally of what was declared.
pub struct DeclarationContext<'a> {
    declarer: &'a dyn ResourceDeclarer,
    outputs: Outputs,
    tally: DeclarationTally,
}

/// Counts of declarations per resource kind and outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationTally {
    /// Declarations per resource kind
    pub by_kind: BTreeMap<ResourceKind, usize>,
    /// Declarations reported as [`DeclareOutcome::Created`]
    pub created: usize,
    /// Declarations reported as [`DeclareOutcome::Updated`]
    pub updated: usize,
    /// Declarations reported as [`DeclareOutcome::Unchanged`]
    pub unchanged: usize,
    /// Declarations reported as [`DeclareOutcome::Planned`]
    pub planned: usize,
}

impl DeclarationTally {
    fn record(&mut self, declared: &Declared) {
        *self.by_kind.entry(declared.kind).or_default() += 1;
        match declared.outcome {
            DeclareOutcome::Created => self.created += 1,
            DeclareOutcome::Updated => self.updated += 1,
            DeclareOutcome::Unchanged => self.unchanged += 1,
            DeclareOutcome::Planned => self.planned += 1,
        }
    }

    /// Number of declarations of one kind
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Total number of declarations
    pub fn total(&self) -> usize {
        self.by_kind.values().sum()
    }
}

impl<'a> DeclarationContext<'a> {
    /// Start a context with empty outputs and tally
    pub fn new(declarer: &'a dyn ResourceDeclarer) -> Self {
        Self {
            declarer,
            outputs: Outputs::new(),
            tally: DeclarationTally::default(),
        }
    }

    /// Declare one resource and account for it
    pub async fn declare(&mut self, request: ResourceRequest) -> Result<Declared> {
        debug!(
            "Declaring {} {} via {}",
            request.kind(),
            request.identity,
            self.declarer.declarer_name()
        );

        let declared = self.declarer.declare(&request).await?;
        self.tally.record(&declared);
        Ok(declared)
    }

    /// Values exported so far
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// Mutable access for exporting values
    pub fn outputs_mut(&mut self) -> &mut Outputs {
        &mut self.outputs
    }

    /// Declarations counted so far
    pub fn tally(&self) -> &DeclarationTally {
        &self.tally
    }

    /// Consume the context, keeping what the run produced
    pub fn into_parts(self) -> (Outputs, DeclarationTally) {
        (self.outputs, self.tally)
    }
}

/// One domain of a zone whose zone resource has been declared
struct DeclaredZone<'z> {
    zone: &'z Zone,
    domain: &'z Domain,
    zone_id: String,
}

/// Declare every domain of a zone with its records
pub async fn setup_zone(ctx: &mut DeclarationContext<'_>, zone: &Zone) -> Result<()> {
    for domain in &zone.domains {
        setup_zone_domain(ctx, zone, domain).await?;
    }
    Ok(())
}

/// Declare the zone for one domain, its settings, then its records
pub async fn setup_zone_domain(
    ctx: &mut DeclarationContext<'_>,
    zone: &Zone,
    domain: &Domain,
) -> Result<()> {
    let identity = zone.domain_identity(domain);
    info!("Declaring zone {} ({})", identity, domain.name);

    let declared = ctx
        .declare(ResourceRequest::zone(&identity, &domain.name))
        .await?;
    if declared.id.is_empty() {
        return Err(Error::declaration(
            &identity,
            format!("{} returned no zone id", ctx.declarer.declarer_name()),
        ));
    }
    ctx.outputs_mut().export(ZONE_IDS, &identity, &declared.id);

    ctx.declare(ResourceRequest::zone_settings(
        &identity,
        &declared.id,
        ZoneSettings::hardened(&zone.settings),
    ))
    .await?;

    let scope = DeclaredZone {
        zone,
        domain,
        zone_id: declared.id,
    };
    setup_hosts(ctx, &scope).await?;
    setup_aliases(ctx, &scope).await?;
    setup_services(ctx, &scope).await
}

async fn setup_hosts(ctx: &mut DeclarationContext<'_>, scope: &DeclaredZone<'_>) -> Result<()> {
    for host in &scope.zone.hosts {
        setup_host(ctx, scope, host).await?;
    }
    Ok(())
}

async fn setup_host(
    ctx: &mut DeclarationContext<'_>,
    scope: &DeclaredZone<'_>,
    host: &Host,
) -> Result<()> {
    for addr in &host.addresses {
        setup_host_address(ctx, scope, host, addr).await?;
    }
    Ok(())
}

async fn setup_host_address(
    ctx: &mut DeclarationContext<'_>,
    scope: &DeclaredZone<'_>,
    host: &Host,
    addr: &HostAddress,
) -> Result<()> {
    let identity = scope.zone.address_identity(scope.domain, host, addr);
    let record = address_record(&scope.zone_id, &scope.domain.name, host, addr);
    ctx.declare(ResourceRequest::dns_record(identity, record))
        .await
        .map(|_| ())
}

async fn setup_aliases(ctx: &mut DeclarationContext<'_>, scope: &DeclaredZone<'_>) -> Result<()> {
    for alias in &scope.zone.aliases {
        setup_alias(ctx, scope, alias).await?;
    }
    Ok(())
}

async fn setup_alias(
    ctx: &mut DeclarationContext<'_>,
    scope: &DeclaredZone<'_>,
    alias: &Alias,
) -> Result<()> {
    let identity = scope.zone.alias_identity(scope.domain, alias);
    let record = alias_record(&scope.zone_id, &scope.domain.name, alias);
    ctx.declare(ResourceRequest::dns_record(identity, record))
        .await
        .map(|_| ())
}

async fn setup_services(ctx: &mut DeclarationContext<'_>, scope: &DeclaredZone<'_>) -> Result<()> {
    for service in &scope.zone.services {
        setup_service(ctx, scope, service).await?;
    }
    Ok(())
}

async fn setup_service(
    ctx: &mut DeclarationContext<'_>,
    scope: &DeclaredZone<'_>,
    service: &Service,
) -> Result<()> {
    let identity = scope.zone.service_identity(scope.domain, service);
    debug!("Service {} targets {}:{}", identity, service.host, service.port);
    let record = service_record(&scope.zone_id, &scope.domain.name, service);
    ctx.declare(ResourceRequest::dns_record(identity, record))
        .await
        .map(|_| ())
}

/// A or AAAA record for one address of a host
pub fn address_record(zone_id: &str, zone_name: &str, host: &Host, addr: &HostAddress) -> DnsRecord {
    DnsRecord {
        zone_id: zone_id.to_string(),
        zone_name: zone_name.to_string(),
        name: host.name.clone(),
        record_type: classify(&addr.value),
        value: RecordValue::Content(addr.value.clone()),
        proxied: false,
    }
}

/// CNAME record for an alias
///
/// An empty name becomes the apex; every placeholder in the target is
/// replaced by the domain name, so `sub.@` under `example.com` points at
/// `sub.example.com`.
pub fn alias_record(zone_id: &str, zone_name: &str, alias: &Alias) -> DnsRecord {
    let name = if alias.name.is_empty() {
        APEX.to_string()
    } else {
        alias.name.clone()
    };

    DnsRecord {
        zone_id: zone_id.to_string(),
        zone_name: zone_name.to_string(),
        name,
        record_type: RecordType::Cname,
        value: RecordValue::Content(alias.host.replace(DOMAIN_PLACEHOLDER, zone_name)),
        proxied: alias.proxied,
    }
}

/// SRV record for a service
pub fn service_record(zone_id: &str, zone_name: &str, service: &Service) -> DnsRecord {
    DnsRecord {
        zone_id: zone_id.to_string(),
        zone_name: zone_name.to_string(),
        name: service.name.clone(),
        record_type: RecordType::Srv,
        value: RecordValue::Srv(SrvData {
            service: service.service.clone(),
            proto: service.proto.clone(),
            name: service.name.clone(),
            priority: service.prio,
            weight: service.weight,
            port: service.port,
            target: service.host.clone(),
        }),
        proxied: false,
    }
}
