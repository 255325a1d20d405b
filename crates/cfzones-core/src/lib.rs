// # cfzones-core
//
// Core library mapping a zone configuration tree to declarative DNS
// resource requests.
//
// ## Architecture Overview
//
// - **ZonesConfig**: configuration tree (zones → domains/hosts → addresses,
//   aliases, services) and its loaders
// - **identity**: stable resource identities built from tree paths
// - **record_type**: A/AAAA inference from address literals
// - **ResourceRequest**: one declarative request (zone, zone settings, record)
// - **ResourceDeclarer**: trait receiving requests (recording, Cloudflare)
// - **mapper**: the tree walk producing requests in dependency order
// - **driver**: runs the mapper over a whole configuration
// - **DeclarerRegistry**: plugin-based selection of declarers
//
// ## Design Principles
//
// 1. **Declarative**: the walk describes end state; declarers reconcile it
// 2. **Producer before consumer**: a zone is declared before anything that
//    references its identifier
// 3. **Fail fast**: the first failing declaration ends the run, unchanged
// 4. **Explicit context**: no global state; everything is passed by parameter

pub mod config;
pub mod declaration;
pub mod driver;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod outputs;
pub mod record_type;
pub mod recorder;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use config::{DeclarerConfig, ZonesConfig};
pub use declaration::{Declared, ResourceKind, ResourceRequest};
pub use driver::{RunSummary, run};
pub use error::{Error, Result};
pub use outputs::Outputs;
pub use recorder::RecordingDeclarer;
pub use registry::DeclarerRegistry;
pub use traits::{DeclarerFactory, ResourceDeclarer};
