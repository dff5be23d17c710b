//! Error types for the wallet checker

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet checker
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    // Provider errors
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider timeout after {0}ms")]
    ProviderTimeout(u64),

    #[error("Provider returned HTTP {status}")]
    ProviderStatus { status: u16 },

    // Cache backend errors
    #[error("Cache backend error: {0}")]
    Cache(String),

    // Decoding errors
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Check if this error is transient (a later request may succeed)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Provider(_)
                | Error::ProviderTimeout(_)
                | Error::ProviderStatus { .. }
                | Error::Cache(_)
        )
    }
}

// Conversion from redis errors
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Cache(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
