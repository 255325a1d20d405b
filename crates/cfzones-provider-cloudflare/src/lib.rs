// # Cloudflare Declarer
//
// This crate provides a Cloudflare API v4 implementation of
// `ResourceDeclarer`: zones, zone security settings and DNS records are
// upserted so that they match the declared state.
//
// ## Behavior
//
// - Every declaration looks the resource up first and writes only when it
//   differs from the request (idempotent)
// - Errors are returned to the caller as-is (no retry, no backoff)
// - HTTP timeout configured (30 seconds)
// - Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - Dry-run mode: lookups are performed, intended writes are only logged
//
// ## Record Identity
//
// Records are tracked by the identity of their request, stored in the record
// comment (`cfzones:main-com-web-v4`). This lets several A records share a
// name, and lets a record be renamed in place.
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - Declarer creation fails if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - Create Zone: POST `/zones`
// - Zone Settings: GET/PATCH `/zones/:zone_id/settings`
// - Universal SSL: GET/PATCH `/zones/:zone_id/ssl/universal/settings`
// - List DNS Records: GET `/zones/:zone_id/dns_records?comment.exact=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Overwrite DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfzones_core::config::DeclarerConfig;
use cfzones_core::declaration::{
    DeclareOutcome, Declared, DnsRecord, RecordValue, ResourceKind, ResourceRequest, ResourceSpec,
    ZoneSettings, on_off,
};
use cfzones_core::record_type::RecordType;
use cfzones_core::traits::{DeclarerFactory, ResourceDeclarer};
use cfzones_core::{DeclarerRegistry, Error, Result};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix of the comment identifying records managed by cfzones
pub const MANAGED_COMMENT_PREFIX: &str = "cfzones:";

/// Prefix of zone ids handed out in dry-run mode for zones that do not exist
const PLANNED_ZONE_PREFIX: &str = "planned:";

/// TTL value meaning "automatic"
const AUTO_TTL: u32 = 1;

/// Cloudflare declarer
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the declarer will:
/// - Perform all GET requests (zone, settings and record lookups)
/// - Log the intended POST/PUT/PATCH payload
/// - **NOT** modify anything
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareDeclarer {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Account that owns newly created zones
    account_id: Option<String>,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,

    api_base: String,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareDeclarer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareDeclarer")
            .field("api_token", &"<REDACTED>")
            .field("account_id", &self.account_id)
            .field("dry_run", &self.dry_run)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CloudflareDeclarer {
    /// Create a new Cloudflare declarer
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Edit, Zone Settings:Edit
    ///   and DNS:Edit permissions
    /// - `account_id`: Account that owns zones created by this declarer;
    ///   without it only existing zones can be declared
    /// - `dry_run`: If true, perform lookups but skip writes
    pub fn new(
        api_token: impl Into<String>,
        account_id: Option<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            account_id,
            client,
            dry_run,
            api_base: CLOUDFLARE_API_BASE.to_string(),
        })
    }

    /// Create a declarer that applies changes
    pub fn new_live(api_token: impl Into<String>, account_id: Option<String>) -> Result<Self> {
        Self::new(api_token, account_id, false)
    }

    /// Create a declarer that only logs intended changes
    pub fn new_dry_run(api_token: impl Into<String>, account_id: Option<String>) -> Result<Self> {
        Self::new(api_token, account_id, true)
    }

    /// Point the declarer at a different API endpoint
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Send one API request and unwrap the Cloudflare response envelope
    ///
    /// Returns the `result` member of a successful response.
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        context: &str,
    ) -> Result<Value> {
        let url = format!("{}{}", self.api_base, path);
        tracing::debug!("{} {} ({})", method, path, context);

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, context));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("Failed to parse response: {}", e)))?;

        if json["success"].as_bool() == Some(false) {
            return Err(Error::provider(
                "cloudflare",
                format!("{} rejected: {}", context, json["errors"]),
            ));
        }

        Ok(json["result"].clone())
    }

    /// Look up a zone by name, creating it when it does not exist
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// POST /zones { "name": "example.com", "account": { "id": "..." }, "type": "full" }
    /// ```
    async fn declare_zone(&self, identity: &str, name: &str) -> Result<Declared> {
        let zones = self
            .call(Method::GET, "/zones", &[("name", name)], None, "Zone lookup")
            .await?;
        let existing = zones
            .as_array()
            .ok_or_else(|| invalid_response("result is not an array"))?
            .first();

        if let Some(zone) = existing {
            let zone_id = string_field(zone, "id")?;
            tracing::info!("Zone {} exists as {}", name, zone_id);
            return Ok(declared(identity, ResourceKind::Zone, zone_id, DeclareOutcome::Unchanged));
        }

        let account_id = self.account_id.as_deref().ok_or_else(|| {
            Error::declaration(
                identity,
                format!("zone {} does not exist and no account id is configured to create it", name),
            )
        })?;
        let payload = json!({
            "name": name,
            "account": { "id": account_id },
            "type": "full",
        });

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would create zone {} with payload: {}", name, payload);
            return Ok(declared(
                identity,
                ResourceKind::Zone,
                format!("{}{}", PLANNED_ZONE_PREFIX, identity),
                DeclareOutcome::Planned,
            ));
        }

        let zone = self
            .call(Method::POST, "/zones", &[], Some(&payload), "Zone creation")
            .await?;
        let zone_id = string_field(&zone, "id")?;
        tracing::info!("Created zone {} as {}", name, zone_id);
        Ok(declared(identity, ResourceKind::Zone, zone_id, DeclareOutcome::Created))
    }

    /// Enforce SSL mode, minimum TLS version, 0-RTT and Universal SSL
    ///
    /// ```http
    /// GET /zones/:zone_id/settings
    /// PATCH /zones/:zone_id/settings { "items": [ { "id": "ssl", "value": "strict" }, ... ] }
    /// GET /zones/:zone_id/ssl/universal/settings
    /// PATCH /zones/:zone_id/ssl/universal/settings { "enabled": true }
    /// ```
    async fn declare_zone_settings(
        &self,
        identity: &str,
        zone_id: &str,
        settings: &ZoneSettings,
    ) -> Result<Declared> {
        if zone_id.starts_with(PLANNED_ZONE_PREFIX) {
            tracing::info!("[DRY-RUN] Would apply settings to new zone {}: {:?}", identity, settings);
            return Ok(declared(identity, ResourceKind::ZoneSettings, zone_id, DeclareOutcome::Planned));
        }

        let settings_path = format!("/zones/{}/settings", zone_id);
        let current = self
            .call(Method::GET, &settings_path, &[], None, "Zone settings lookup")
            .await?;
        let current = current
            .as_array()
            .ok_or_else(|| invalid_response("settings result is not an array"))?;
        let items = settings_changes(current, settings);

        let universal_path = format!("/zones/{}/ssl/universal/settings", zone_id);
        let universal = self
            .call(Method::GET, &universal_path, &[], None, "Universal SSL lookup")
            .await?;
        let universal_changed = universal["enabled"].as_bool() != Some(settings.universal_ssl);

        if items.is_empty() && !universal_changed {
            tracing::debug!("Zone settings of {} already match", identity);
            return Ok(declared(identity, ResourceKind::ZoneSettings, zone_id, DeclareOutcome::Unchanged));
        }

        let universal_payload = json!({ "enabled": settings.universal_ssl });
        let items_payload = json!({ "items": items });

        if self.dry_run {
            if !items.is_empty() {
                tracing::info!("[DRY-RUN] Would PATCH {} with payload: {}", settings_path, items_payload);
            }
            if universal_changed {
                tracing::info!("[DRY-RUN] Would PATCH {} with payload: {}", universal_path, universal_payload);
            }
            return Ok(declared(identity, ResourceKind::ZoneSettings, zone_id, DeclareOutcome::Planned));
        }

        if !items.is_empty() {
            self.call(Method::PATCH, &settings_path, &[], Some(&items_payload), "Zone settings update")
                .await?;
        }
        if universal_changed {
            self.call(Method::PATCH, &universal_path, &[], Some(&universal_payload), "Universal SSL update")
                .await?;
        }

        tracing::info!("Zone settings of {} updated", identity);
        Ok(declared(identity, ResourceKind::ZoneSettings, zone_id, DeclareOutcome::Updated))
    }

    /// Create or overwrite the record carrying this identity
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?comment.exact=cfzones:main-com-web-v4
    /// POST /zones/:zone_id/dns_records
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn declare_record(&self, identity: &str, record: &DnsRecord) -> Result<Declared> {
        let payload = record_payload(identity, record);

        if record.zone_id.starts_with(PLANNED_ZONE_PREFIX) {
            tracing::info!("[DRY-RUN] Would create record {} with payload: {}", identity, payload);
            return Ok(declared(identity, ResourceKind::DnsRecord, "", DeclareOutcome::Planned));
        }

        let records_path = format!("/zones/{}/dns_records", record.zone_id);
        let comment = managed_comment(identity);
        let found = self
            .call(
                Method::GET,
                &records_path,
                &[("comment.exact", comment.as_str())],
                None,
                "Record lookup",
            )
            .await?;
        let existing = found
            .as_array()
            .ok_or_else(|| invalid_response("result is not an array"))?
            .first();

        match existing {
            Some(current) if record_matches(current, &payload) => {
                let record_id = string_field(current, "id")?;
                tracing::debug!("Record {} already matches", identity);
                Ok(declared(identity, ResourceKind::DnsRecord, record_id, DeclareOutcome::Unchanged))
            }
            Some(current) => {
                let record_id = string_field(current, "id")?;
                let record_path = format!("{}/{}", records_path, record_id);
                if self.dry_run {
                    tracing::info!("[DRY-RUN] Would PUT {} with payload: {}", record_path, payload);
                    return Ok(declared(identity, ResourceKind::DnsRecord, record_id, DeclareOutcome::Planned));
                }

                self.call(Method::PUT, &record_path, &[], Some(&payload), "Record update")
                    .await?;
                tracing::info!(
                    "Updated {} record {} ({})",
                    record.record_type,
                    record.fqdn(),
                    identity
                );
                Ok(declared(identity, ResourceKind::DnsRecord, record_id, DeclareOutcome::Updated))
            }
            None => {
                if self.dry_run {
                    tracing::info!("[DRY-RUN] Would POST {} with payload: {}", records_path, payload);
                    return Ok(declared(identity, ResourceKind::DnsRecord, "", DeclareOutcome::Planned));
                }

                let created = self
                    .call(Method::POST, &records_path, &[], Some(&payload), "Record creation")
                    .await?;
                let record_id = string_field(&created, "id")?;
                tracing::info!(
                    "Created {} record {} ({})",
                    record.record_type,
                    record.fqdn(),
                    identity
                );
                Ok(declared(identity, ResourceKind::DnsRecord, record_id, DeclareOutcome::Created))
            }
        }
    }
}

#[async_trait]
impl ResourceDeclarer for CloudflareDeclarer {
    async fn declare(&self, request: &ResourceRequest) -> Result<Declared> {
        match &request.spec {
            ResourceSpec::Zone { name } => self.declare_zone(&request.identity, name).await,
            ResourceSpec::ZoneSettings { zone_id, settings } => {
                self.declare_zone_settings(&request.identity, zone_id, settings)
                    .await
            }
            ResourceSpec::DnsRecord(record) => self.declare_record(&request.identity, record).await,
        }
    }

    fn declarer_name(&self) -> &'static str {
        "cloudflare"
    }
}

fn declared(
    identity: &str,
    kind: ResourceKind,
    id: impl Into<String>,
    outcome: DeclareOutcome,
) -> Declared {
    Declared {
        identity: identity.to_string(),
        kind,
        id: id.into(),
        outcome,
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, error_text: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{}: {} - {}", context, status, error_text)),
        409 => Error::provider(
            "cloudflare",
            format!("Conflict during {}: {} - {}", context, status, error_text),
        ),
        429 => Error::rate_limited(format!(
            "Cloudflare rate limit exceeded during {}. Status: {}",
            context, status
        )),
        500..=599 => Error::provider(
            "cloudflare",
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            "cloudflare",
            format!("{} failed: {} - {}", context, status, error_text),
        ),
    }
}

fn invalid_response(what: &str) -> Error {
    Error::provider("cloudflare", format!("Invalid response format: {}", what))
}

fn string_field(value: &Value, field: &str) -> Result<String> {
    value[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid_response(&format!("{} is not a string", field)))
}

/// Comment marking a record as the one declared under `identity`
pub fn managed_comment(identity: &str) -> String {
    format!("{}{}", MANAGED_COMMENT_PREFIX, identity)
}

/// Request body for creating or overwriting a record
pub fn record_payload(identity: &str, record: &DnsRecord) -> Value {
    let mut payload = json!({
        "type": record.record_type.as_str(),
        "name": record.fqdn(),
        "ttl": AUTO_TTL,
        "comment": managed_comment(identity),
    });

    match &record.value {
        RecordValue::Content(content) => {
            payload["content"] = json!(content);
            payload["proxied"] = json!(record.proxied);
        }
        RecordValue::Srv(srv) => {
            payload["data"] = json!({
                "priority": srv.priority,
                "weight": srv.weight,
                "port": srv.port,
                "target": srv.target,
            });
        }
    }

    payload
}

/// Whether an existing record already has the desired state
pub fn record_matches(current: &Value, desired: &Value) -> bool {
    let same_str = |field: &str| {
        let a = current[field].as_str().unwrap_or_default();
        let b = desired[field].as_str().unwrap_or_default();
        normalize_name(a) == normalize_name(b)
    };

    if current["type"] != desired["type"] || !same_str("name") {
        return false;
    }

    if desired.get("data").is_some() {
        let (cur, want) = (&current["data"], &desired["data"]);
        return ["priority", "weight", "port"]
            .iter()
            .all(|f| cur[*f].as_u64() == want[*f].as_u64())
            && normalize_name(cur["target"].as_str().unwrap_or_default())
                == normalize_name(want["target"].as_str().unwrap_or_default());
    }

    if current["proxied"].as_bool().unwrap_or(false) != desired["proxied"].as_bool().unwrap_or(false)
    {
        return false;
    }

    let current_content = current["content"].as_str().unwrap_or_default();
    let desired_content = desired["content"].as_str().unwrap_or_default();
    match desired["type"].as_str() {
        Some(t) if t == RecordType::A.as_str() || t == RecordType::Aaaa.as_str() => {
            match (current_content.parse::<IpAddr>(), desired_content.parse::<IpAddr>()) {
                (Ok(a), Ok(b)) => a == b,
                _ => current_content == desired_content,
            }
        }
        _ => normalize_name(current_content) == normalize_name(desired_content),
    }
}

fn normalize_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// Zone setting items that differ from the desired settings
pub fn settings_changes(current: &[Value], desired: &ZoneSettings) -> Vec<Value> {
    let mut wanted = vec![
        ("ssl", desired.ssl.as_str()),
        ("min_tls_version", desired.min_tls_version.as_str()),
    ];
    if let Some(zero_rtt) = desired.zero_rtt {
        wanted.push(("0rtt", on_off(zero_rtt)));
    }

    wanted
        .into_iter()
        .filter(|(id, value)| {
            let current_value = current
                .iter()
                .find(|item| item["id"].as_str() == Some(*id))
                .and_then(|item| item["value"].as_str());
            current_value != Some(*value)
        })
        .map(|(id, value)| json!({ "id": id, "value": value }))
        .collect()
}

/// Factory for creating Cloudflare declarers
pub struct CloudflareFactory;

impl DeclarerFactory for CloudflareFactory {
    fn create(&self, config: &DeclarerConfig) -> Result<Box<dyn ResourceDeclarer>> {
        match config {
            DeclarerConfig::Cloudflare {
                api_token,
                account_id,
                dry_run,
            } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token is required"));
                }

                if *dry_run {
                    tracing::warn!("Cloudflare declarer running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(CloudflareDeclarer::new(
                    api_token.clone(),
                    account_id.clone(),
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare declarer")),
        }
    }
}

/// Register the Cloudflare declarer with a registry
///
/// # Example
///
/// ```rust
/// use cfzones_core::DeclarerRegistry;
///
/// let registry = DeclarerRegistry::new();
/// cfzones_provider_cloudflare::register(&registry);
/// assert!(registry.has_declarer("cloudflare"));
/// ```
pub fn register(registry: &DeclarerRegistry) {
    registry.register_declarer("cloudflare", Box::new(CloudflareFactory));
}
