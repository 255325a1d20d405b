// # Recording Declarer
//
// In-memory implementation of ResourceDeclarer.
//
// ## Purpose
//
// Accepts every request, assigns a synthetic identifier and keeps the
// ordered log of what was declared. Nothing leaves the process.
//
// ## When to Use
//
// - Plan mode: show what a run would declare without provider credentials
// - Tests: inspect the exact sequence of requests a configuration produces
//
// Synthetic identifiers are derived from the request identity
// (`plan:<kind>:<identity>`), so a plan is deterministic across runs.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::config::DeclarerConfig;
use crate::declaration::{DeclareOutcome, Declared, ResourceRequest};
use crate::traits::{DeclarerFactory, ResourceDeclarer};
use crate::{Error, Result};

/// In-memory declarer that records every request
///
/// Clones share the same log.
///
/// # Example
///
/// ```rust
/// use cfzones_core::declaration::ResourceRequest;
/// use cfzones_core::recorder::RecordingDeclarer;
/// use cfzones_core::traits::ResourceDeclarer;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let declarer = RecordingDeclarer::new();
///
///     let declared = declarer
///         .declare(&ResourceRequest::zone("main-com", "example.com"))
///         .await?;
///     assert_eq!(declared.id, "plan:zone:main-com");
///     assert_eq!(declarer.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingDeclarer {
    inner: Arc<Mutex<Vec<ResourceRequest>>>,
}

impl RecordingDeclarer {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests declared so far, in order
    pub fn requests(&self) -> Vec<ResourceRequest> {
        self.lock().clone()
    }

    /// Number of requests declared so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been declared yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget everything declared so far
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ResourceRequest>> {
        // A poisoned log still holds every request pushed before the panic
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ResourceDeclarer for RecordingDeclarer {
    async fn declare(&self, request: &ResourceRequest) -> Result<Declared> {
        let kind = request.kind();
        let id = format!("plan:{}:{}", kind, request.identity);

        tracing::debug!("Recorded {} {}", kind, request.identity);
        self.lock().push(request.clone());

        Ok(Declared {
            identity: request.identity.clone(),
            kind,
            id,
            outcome: DeclareOutcome::Planned,
        })
    }

    fn declarer_name(&self) -> &'static str {
        "plan"
    }
}

/// Factory for creating recording declarers
pub struct RecordingDeclarerFactory;

impl DeclarerFactory for RecordingDeclarerFactory {
    fn create(&self, config: &DeclarerConfig) -> Result<Box<dyn ResourceDeclarer>> {
        match config {
            DeclarerConfig::Plan => Ok(Box::new(RecordingDeclarer::new())),
            _ => Err(Error::config("Invalid config for plan declarer")),
        }
    }
}
