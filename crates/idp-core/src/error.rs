//! Core error handling.
//!
//! Error messages are informative for operators while never exposing
//! credential material or peer-supplied secrets.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Cache error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Cryptographic error.
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Internal error.
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Cache(_) | Self::Crypto(_) | Self::Internal
        )
    }

    /// Returns whether this error was caused by the caller.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_is_generic() {
        let error = Error::Internal;
        assert_eq!(error.to_string(), "internal error");
    }

    #[test]
    fn classification() {
        assert!(Error::Cache("down".to_string()).is_server_error());
        assert!(!Error::Cache("down".to_string()).is_client_error());
        assert!(Error::NotFound("peer".to_string()).is_client_error());
        assert!(Error::Validation("bad".to_string()).is_client_error());
    }
}
