use thiserror::Error;

/// Result alias for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure-level errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unloadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The global logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Free-form error, usually carrying attached context
    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
