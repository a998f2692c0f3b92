//! Error types for DoViBake

use thiserror::Error;

/// Result type alias for DoViBake operations
pub type Result<T> = std::result::Result<T, Error>;

/// DoViBake error type
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (fatal, detected at construction)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Layer mismatch: {0}")]
    LayerMismatch(String),

    #[error("Invalid trim bounds: {0}")]
    InvalidTrim(String),

    // Resource errors
    #[error("Mapping engine construction failed: {0}")]
    EngineInit(String),

    // Per-frame errors
    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    // General errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error only affects a single frame
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Metadata(_))
    }

    /// Check if this error stems from the pipeline setup
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::UnsupportedFormat(_)
                | Error::LayerMismatch(_)
                | Error::InvalidTrim(_)
                | Error::ConfigParse(_)
        )
    }
}
