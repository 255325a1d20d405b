// # cfzones - Zone Configuration Applier
//
// This binary is a THIN integration layer:
// - DO NOT add mapping, record or Cloudflare logic here
// - All mapping logic lives in cfzones-core, all API logic in the declarer
// - Process configuration is via environment variables ONLY
//
// The cfzones binary is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Loading the zone configuration and registering declarers
// 4. Running the declaration walk once and reporting its outputs
//
// ## Configuration
//
// ### Zones
// - `CFZONES_CONFIG`: Path to the YAML zone configuration
// - `CFZONES_ZONES`: Inline YAML/JSON zone configuration (wins over the path)
//
// ### Declarer
// - `CFZONES_DECLARER`: Declarer type (cloudflare, plan)
// - `CFZONES_API_TOKEN`: API token (cloudflare)
// - `CFZONES_ACCOUNT_ID`: Account owning created zones (cloudflare, optional)
// - `CFZONES_MODE`: live or dry-run (cloudflare)
//
// ### Output
// - `CFZONES_OUTPUTS_PATH`: JSON file receiving exported outputs (optional)
// - `CFZONES_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export CFZONES_CONFIG=/etc/cfzones/zones.yaml
// export CFZONES_API_TOKEN=your_token
// export CFZONES_ACCOUNT_ID=your_account
// export CFZONES_OUTPUTS_PATH=/var/lib/cfzones/outputs.json
//
// cfzones
// ```

use anyhow::Result;
use cfzones_core::{DeclarerConfig, DeclarerRegistry, ZonesConfig};
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: All resources declared
/// - 1: Configuration error, nothing declared
/// - 2: Declaration or runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CfzonesExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<CfzonesExitCode> for ExitCode {
    fn from(code: CfzonesExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process configuration
struct Config {
    declarer_type: String,
    api_token: Option<String>,
    account_id: Option<String>,
    mode: String,
    outputs_path: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            declarer_type: non_empty("CFZONES_DECLARER").unwrap_or_else(|| "cloudflare".to_string()),
            api_token: non_empty("CFZONES_API_TOKEN"),
            account_id: non_empty("CFZONES_ACCOUNT_ID"),
            mode: non_empty("CFZONES_MODE").unwrap_or_else(|| "live".to_string()),
            outputs_path: non_empty("CFZONES_OUTPUTS_PATH"),
            log_level: non_empty("CFZONES_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.declarer_type.as_str() {
            "cloudflare" => {
                if self.api_token.is_none() {
                    anyhow::bail!(
                        "CFZONES_API_TOKEN is required when CFZONES_DECLARER=cloudflare. \
                        Set it via: export CFZONES_API_TOKEN=your_token"
                    );
                }
            }
            "plan" => {}
            _ => anyhow::bail!(
                "CFZONES_DECLARER '{}' is not supported. \
                Supported declarers: cloudflare, plan",
                self.declarer_type
            ),
        }

        match self.mode.as_str() {
            "live" | "dry-run" => {}
            _ => anyhow::bail!(
                "CFZONES_MODE '{}' is not valid. Valid modes: live, dry-run",
                self.mode
            ),
        }

        if let Some(ref path) = self.outputs_path
            && std::path::Path::new(path).file_name().is_none()
        {
            anyhow::bail!("CFZONES_OUTPUTS_PATH must name a file. Got: {}", path);
        }

        if parse_level(&self.log_level).is_none() {
            anyhow::bail!(
                "CFZONES_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }

    /// Declarer configuration for the registry
    fn declarer_config(&self) -> DeclarerConfig {
        match self.declarer_type.as_str() {
            "cloudflare" => DeclarerConfig::Cloudflare {
                api_token: self.api_token.clone().unwrap_or_default(),
                account_id: self.account_id.clone(),
                dry_run: self.mode == "dry-run",
            },
            _ => DeclarerConfig::Plan,
        }
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    let config = Config::from_env();

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return CfzonesExitCode::ConfigError.into();
    }

    let log_level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CfzonesExitCode::ConfigError.into();
    }

    info!("Starting cfzones");

    // Declarations are strictly sequential
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CfzonesExitCode::RuntimeError.into();
        }
    };

    rt.block_on(apply(config)).into()
}

/// Load zones, run the walk and report outputs
async fn apply(config: Config) -> CfzonesExitCode {
    let zones = match ZonesConfig::from_env().await {
        Ok(zones) => zones,
        Err(e) => {
            error!("Zone configuration error: {}", e);
            return CfzonesExitCode::ConfigError;
        }
    };
    info!(
        "Configuration loaded: {} zone(s), {} domain(s)",
        zones.zones.len(),
        zones.domain_count()
    );

    let registry = DeclarerRegistry::with_builtin();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare declarer");
        cfzones_provider_cloudflare::register(&registry);
    }

    let declarer_config = config.declarer_config();
    let declarer = match registry.create_declarer(&declarer_config) {
        Ok(declarer) => declarer,
        Err(e) => {
            error!("Failed to create declarer: {}", e);
            return CfzonesExitCode::ConfigError;
        }
    };
    info!("Using declarer: {}", declarer.declarer_name());
    if config.mode == "dry-run" && declarer_config.type_name() != "cloudflare" {
        warn!("CFZONES_MODE=dry-run has no effect on the {} declarer", declarer.declarer_name());
    }

    let summary = match cfzones_core::run(&zones, declarer.as_ref()).await {
        Ok(summary) => summary,
        Err(e) if e.is_config() => {
            error!("Zone configuration error: {}", e);
            return CfzonesExitCode::ConfigError;
        }
        Err(e) => {
            error!("Declaration failed: {}", e);
            return CfzonesExitCode::RuntimeError;
        }
    };

    match summary.outputs.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to render outputs: {}", e);
            return CfzonesExitCode::RuntimeError;
        }
    }

    if let Some(ref path) = config.outputs_path {
        if let Err(e) = summary.outputs.write_to_file(path).await {
            error!("Failed to write outputs to {}: {}", path, e);
            return CfzonesExitCode::RuntimeError;
        }
        info!("Outputs written to {}", path);
    }

    CfzonesExitCode::Success
}
