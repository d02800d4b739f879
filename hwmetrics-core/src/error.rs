//! Error types for configuration resolution

use std::path::PathBuf;
use thiserror::Error;

/// Error raised while loading settings or resolving them into a configuration.
///
/// Every variant is fatal at startup: the exporter must not fall back to a
/// partial configuration that could talk to the wrong backend or apply the
/// wrong trust policy.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// More than one backend section is present
    #[error("Conflicting backends configured: {}", .backends.join(", "))]
    Conflict { backends: Vec<&'static str> },

    /// A present backend section lacks a required field
    #[error("Backend '{backend}' is enabled but '{key}' is not set")]
    MissingField {
        backend: &'static str,
        key: &'static str,
    },

    /// A value cannot be parsed to its expected type
    #[error("Invalid value for '{key}': '{value}' ({reason})")]
    Parse {
        key: String,
        value: String,
        reason: String,
    },

    /// The certificate named by the verification setting cannot be loaded
    #[error("Failed to load certificate '{}': {reason}", .path.display())]
    CertificateLoad { path: PathBuf, reason: String },

    /// I/O errors while reading a settings file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not valid TOML or YAML
    #[error("Settings format error: {0}")]
    Format(String),
}

impl ConfigError {
    /// Build a [`ConfigError::Parse`] for `key` holding the raw `value`.
    pub fn parse(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::Parse {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Format(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Format(err.to_string())
    }
}
