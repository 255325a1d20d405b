//! Core traits for cfzones
//!
//! - [`ResourceDeclarer`]: receives declarative resource requests
//! - [`DeclarerFactory`]: builds declarers from configuration

pub mod declarer;

pub use declarer::{DeclarerFactory, ResourceDeclarer};
