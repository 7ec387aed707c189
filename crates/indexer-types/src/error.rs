//! Error types shared by configuration loading.

use thiserror::Error;

/// Errors raised while loading or validating indexer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying loader failure (missing file, bad TOML, bad env value)
    #[error("Configuration load error: {0}")]
    Load(#[from] config::ConfigError),

    /// Structurally valid configuration with invalid contents
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
