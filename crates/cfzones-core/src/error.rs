//! Error types for cfzones
//!
//! Two families of failure exist:
//!
//! - **Configuration errors** ([`Error::Config`]): the zone configuration is
//!   malformed or incomplete. Detected at load time, before any resource is
//!   declared.
//! - **Declaration errors** (every other variant raised by a declarer): a
//!   declarative resource call was rejected or could not be issued. These are
//!   propagated unchanged and abort the remaining walk.

use thiserror::Error;

/// Result type alias for cfzones operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cfzones
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing configuration field
    #[error("Configuration error: {0}")]
    Config(String),

    /// A declarative resource call was rejected
    #[error("Declaration of {identity} failed: {message}")]
    Declaration {
        /// Identity of the resource being declared
        identity: String,
        /// Error message
        message: String,
    },

    /// I/O errors (config files, outputs file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration error citing the offending key
    pub fn config_field(key: impl AsRef<str>, msg: impl AsRef<str>) -> Self {
        Self::Config(format!("{}: {}", key.as_ref(), msg.as_ref()))
    }

    /// Create a declaration error for the resource with the given identity
    pub fn declaration(identity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Declaration {
            identity: identity.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised while loading configuration
    ///
    /// Everything that is not a configuration error happened while declaring
    /// resources (or writing outputs) and is reported as a runtime failure.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Yaml(_))
    }
}
