//! Error types for provider operations

use thiserror::Error;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors a provider call can end with
#[derive(Error, Debug)]
pub enum ProviderError {
    /// No response was received: timeout, refused or reset connection, TLS failure
    #[error("Transient network error: {0}")]
    Transient(String),

    /// Resource not found (track, playlist, playable URL)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The provider answered with an error status or error body
    #[error("Provider API error (code {code}): {message}")]
    Api { code: u16, message: String },

    /// Quota exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response decoded but lacks what the caller needs
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The provider does not implement this operation
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    /// Platform tag not recognized
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),
}

impl ProviderError {
    /// Maps an HTTP status code to an error
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            404 => Self::NotFound(message.into()),
            429 => Self::RateLimited,
            _ => Self::Api {
                code,
                message: message.into(),
            },
        }
    }

    /// Whether the call may succeed if simply issued again
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, ProviderError::Unsupported(_))
    }
}
