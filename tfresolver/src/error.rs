//! Error types of the resolution engine

use std::fmt;
use tfsource::{Platform, TrackKey};
use thiserror::Error;

/// Why one provider attempt did not produce a usable URL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The provider call failed (after its own retry)
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider answered but the URL did not pass the probe
    #[error("url failed validation")]
    ValidationFailed,

    /// The attempt deadline expired
    #[error("timed out")]
    TimedOut,
}

/// One failed attempt, in the order attempts were made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub provider: String,
    pub reason: FailureReason,
}

impl AttemptFailure {
    pub fn new(provider: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            provider: provider.into(),
            reason,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

fn summarize(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(AttemptFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Terminal failure of a resolution
///
/// `Clone` so one outcome can be handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("could not resolve {key} ({})", summarize(.attempts))]
    ResolutionFailed {
        key: TrackKey,
        attempts: Vec<AttemptFailure>,
    },

    #[error("no provider serves platform {platform}")]
    NoProviders { platform: Platform },

    /// The resolution task ended without an outcome
    #[error("resolution interrupted")]
    Interrupted,
}

/// Errors surfaced to the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("invalid track id: {0:?}")]
    InvalidTrackId(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("search keywords must not be empty")]
    InvalidKeywords,

    #[error("play queue index {index} out of range (queue length {len})")]
    InvalidQueueIndex { index: usize, len: usize },

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error("{operation} failed on {platform} ({})", summarize(.attempts))]
    BrowseFailed {
        platform: Platform,
        operation: &'static str,
        attempts: Vec<AttemptFailure>,
    },
}
