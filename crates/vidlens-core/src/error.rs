use thiserror::Error;

/// Top-level error type for Vidlens.
///
/// Subsystem crates define their own error types and convert into or out of
/// `VidlensError` where they cross crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VidlensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for VidlensError {
    fn from(err: toml::de::Error) -> Self {
        VidlensError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VidlensError {
    fn from(err: toml::ser::Error) -> Self {
        VidlensError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VidlensError {
    fn from(err: serde_json::Error) -> Self {
        VidlensError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Vidlens operations.
pub type Result<T> = std::result::Result<T, VidlensError>;
