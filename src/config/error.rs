//! Configuration error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors raised while reading, decoding or checking server descriptors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed kind, TLS version, auth type, duration or socket mode text.
    #[error("cannot parse {what} from {value:?}")]
    Parse { what: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Decoder rejected the document.
    #[error("decode error: {0}")]
    Format(String),

    #[error("unsupported config format for {0:?} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Format(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Format(err.to_string())
    }
}
