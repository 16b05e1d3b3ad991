//! Error types for provider construction and HTTP error classification

use tfsource::ProviderError;

/// Result type for provider construction
pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Errors raised while building provider clients
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The shared HTTP client could not be created
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint declares a platform tag nobody serves
    #[error("Unknown platform '{platform}' for endpoint {endpoint}")]
    UnknownPlatform { endpoint: String, platform: String },

    /// Endpoint base URL is empty or not http(s)
    #[error("Invalid base URL for endpoint {endpoint}: {url}")]
    InvalidBaseUrl { endpoint: String, url: String },
}

/// Maps a reqwest failure onto the provider error taxonomy
///
/// Anything that happened before an HTTP response was received is
/// `Transient` and therefore eligible for the single retry.
pub(crate) fn classify(err: reqwest::Error) -> ProviderError {
    if let Some(status) = err.status() {
        return ProviderError::from_status_code(status.as_u16(), err.to_string());
    }
    if err.is_decode() {
        return ProviderError::InvalidResponse(err.to_string());
    }
    if err.is_builder() {
        return ProviderError::InvalidResponse(format!("bad request: {}", err));
    }
    // timeout, connect, TLS handshake, reset while reading the body
    ProviderError::Transient(err.to_string())
}
