//! Plugin-based declarer registry
//!
//! The registry lets declarers be registered at runtime and selected by
//! name from configuration, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cfzones_core::registry::DeclarerRegistry;
//! use cfzones_core::config::DeclarerConfig;
//!
//! let registry = DeclarerRegistry::with_builtin();
//! cfzones_provider_cloudflare::register(&registry);
//!
//! let declarer = registry.create_declarer(&DeclarerConfig::Plan)?;
//! ```

use crate::config::DeclarerConfig;
use crate::error::{Error, Result};
use crate::recorder::RecordingDeclarerFactory;
use crate::traits::{DeclarerFactory, ResourceDeclarer};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry mapping declarer type names to factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct DeclarerRegistry {
    declarers: RwLock<HashMap<String, Box<dyn DeclarerFactory>>>,
}

impl DeclarerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the in-process declarers (`plan`) registered
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_declarer("plan", Box::new(RecordingDeclarerFactory));
        registry
    }

    /// Register a declarer factory under a type name
    ///
    /// Registering the same name twice replaces the earlier factory.
    pub fn register_declarer(&self, name: impl Into<String>, factory: Box<dyn DeclarerFactory>) {
        let name = name.into();
        let mut declarers = self
            .declarers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        declarers.insert(name, factory);
    }

    /// Create a declarer from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ResourceDeclarer>)`: Created declarer
    /// - `Err(Error)`: If the configuration is invalid, the type is not
    ///   registered, or creation fails
    pub fn create_declarer(&self, config: &DeclarerConfig) -> Result<Box<dyn ResourceDeclarer>> {
        config.validate()?;

        let declarer_type = config.type_name();
        let declarers = self
            .declarers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let factory = declarers
            .get(declarer_type)
            .ok_or_else(|| Error::config(format!("Unknown declarer type: {}", declarer_type)))?;

        factory.create(config)
    }

    /// List all registered declarer types, sorted
    pub fn list_declarers(&self) -> Vec<String> {
        let declarers = self
            .declarers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = declarers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a declarer type is registered
    pub fn has_declarer(&self, name: &str) -> bool {
        let declarers = self
            .declarers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        declarers.contains_key(name)
    }
}
