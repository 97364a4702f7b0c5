//! Error types for the nutrition assistant.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the assistant's collaborators and input boundaries.
///
/// The classification and validation core never produces these for
/// well-typed input; they come from storage, AWS calls, malformed payloads
/// and configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// AWS SDK or Lambda collaborator error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input had the wrong shape (missing food list, unparseable form body)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Webhook signature did not verify
    #[error("Signature error: {0}")]
    Signature(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_) => 400,
            Error::Signature(_) => 403,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::InvalidInput("no foods".into()).status_code(), 400);
        assert_eq!(Error::Signature("bad".into()).status_code(), 403);
        assert_eq!(Error::Aws("timeout".into()).status_code(), 500);
    }
}
