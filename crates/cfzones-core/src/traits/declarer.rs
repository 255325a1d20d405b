// # Resource Declarer Trait
//
// Defines the interface that receives declarative resource requests.
//
// ## Implementations
//
// - Recording: `cfzones_core::recorder::RecordingDeclarer` (plan output, tests)
// - Cloudflare: `cfzones-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfzones_core::{ResourceDeclarer, ResourceRequest};
//
// let declared = declarer
//     .declare(&ResourceRequest::zone("main-com", "example.com"))
//     .await?;
// println!("zone id: {}", declared.id);
// ```

use async_trait::async_trait;

use crate::declaration::{Declared, ResourceRequest};

/// Receiver of declarative resource requests
///
/// The mapper hands requests over one at a time and awaits each before
/// issuing the next. A declarer brings the resource to the requested state
/// and reports the identifier it carries on the provider side.
///
/// # Contract
///
/// - Idempotent: declaring the same request twice leaves the provider in the
///   same state as declaring it once.
/// - Single-shot: no retry, no backoff, no background tasks. A failure is
///   returned as an error and ends the run.
/// - Zone requests must return the zone identifier in [`Declared::id`];
///   later requests of that zone reference it.
#[async_trait]
pub trait ResourceDeclarer: Send + Sync {
    /// Bring one resource to the requested state
    async fn declare(&self, request: &ResourceRequest) -> Result<Declared, crate::Error>;

    /// Name of the declarer (for logging)
    fn declarer_name(&self) -> &'static str;
}

/// Helper trait for constructing declarers from configuration
pub trait DeclarerFactory: Send + Sync {
    /// Create a declarer instance from configuration
    fn create(
        &self,
        config: &crate::config::DeclarerConfig,
    ) -> Result<Box<dyn ResourceDeclarer>, crate::Error>;
}
