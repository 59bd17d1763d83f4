use thiserror::Error;

/// Top-level error type for the action log.
///
/// Subsystem crates define their own error types and wrap this one via
/// `#[from]` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ActionLogError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Host lookup error: {0}")]
    Host(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ActionLogError {
    fn from(err: toml::de::Error) -> Self {
        ActionLogError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ActionLogError {
    fn from(err: toml::ser::Error) -> Self {
        ActionLogError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ActionLogError {
    fn from(err: serde_json::Error) -> Self {
        ActionLogError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for action log operations.
pub type Result<T> = std::result::Result<T, ActionLogError>;
