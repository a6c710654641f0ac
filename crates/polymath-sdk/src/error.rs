//! Error types for the Polymath SDK

use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types
#[derive(Error, Debug)]
pub enum SdkError {
    /// Content type tag not in the supported set
    #[error("Unknown content type: {0}")]
    UnknownContentType(String),

    /// Operation needs a signed-in viewer
    #[error("Authentication required")]
    AuthRequired,

    /// A toggle for the same item is already running
    #[error("Request already in flight for {0}")]
    InFlight(String),

    /// Input rejected before any remote call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote table, RPC or function call failed
    #[error("Remote error: {0}")]
    Remote(String),

    /// The owning session was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<polymath_client::ClientError> for SdkError {
    fn from(err: polymath_client::ClientError) -> Self {
        SdkError::Remote(err.to_string())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}
