//! Failover router: one track key in, one validated URL (or every reason
//! why not) out
//!
//! Providers of the track's platform are tried in preference order, at most
//! `max_providers` of them, each under its own deadline. A URL only counts
//! once the validator accepted it. The cycle never restarts.

use crate::error::{AttemptFailure, FailureReason, ResolveError};
use crate::registry::{ProviderDescriptor, ProviderRegistry};
use crate::validator::UrlValidator;
use std::sync::Arc;
use std::time::Duration;
use tfconfig::EngineSettings;
use tfsource::TrackKey;
use tokio::time::timeout;
use tracing::{debug, warn};

/// A playable URL and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub url: String,
    /// Id of the provider that produced the URL
    pub provider: String,
    pub validated: bool,
}

#[derive(Debug)]
pub struct FailoverRouter {
    registry: Arc<ProviderRegistry>,
    validator: Arc<dyn UrlValidator>,
    max_providers: usize,
    retry_backoff: Duration,
    validation_timeout: Duration,
}

impl FailoverRouter {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        validator: Arc<dyn UrlValidator>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            registry,
            validator,
            max_providers: settings.max_providers_per_request.max(1),
            retry_backoff: settings.retry_backoff,
            validation_timeout: settings.validation_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Deadline of one provider call, its retry included
    pub fn attempt_deadline(&self, candidate: &ProviderDescriptor) -> Duration {
        candidate.timeout + self.retry_backoff
    }

    pub async fn resolve(&self, key: &TrackKey) -> Result<ResolvedUrl, ResolveError> {
        let candidates = self.registry.candidates(key.platform, self.max_providers);
        if candidates.is_empty() {
            return Err(ResolveError::NoProviders {
                platform: key.platform,
            });
        }

        let mut attempts = Vec::with_capacity(candidates.len());

        for candidate in &candidates {
            let provider_id = candidate.id();
            debug!(
                provider = provider_id,
                track = %key,
                rank = candidate.rank,
                "resolution attempt"
            );

            let reason = match self.attempt(candidate, key).await {
                Ok(url) => {
                    if candidate.rank > 0 {
                        self.registry.promote(key.platform, provider_id);
                    } else {
                        self.registry.record_success(key.platform, provider_id);
                    }
                    return Ok(ResolvedUrl {
                        url,
                        provider: provider_id.to_string(),
                        validated: true,
                    });
                }
                Err(reason) => reason,
            };

            warn!(provider = provider_id, track = %key, "attempt failed: {}", reason);
            self.registry.record_failure(key.platform, provider_id);
            attempts.push(AttemptFailure::new(provider_id, reason));
        }

        Err(ResolveError::ResolutionFailed {
            key: key.clone(),
            attempts,
        })
    }

    async fn attempt(&self, candidate: &ProviderDescriptor, key: &TrackKey) -> Result<String, FailureReason> {
        let url = match timeout(self.attempt_deadline(candidate), candidate.provider.resolve_url(&key.id)).await {
            Err(_) => return Err(FailureReason::TimedOut),
            Ok(Err(e)) => return Err(FailureReason::ProviderUnavailable(e.to_string())),
            Ok(Ok(url)) => url,
        };

        match timeout(self.validation_timeout, self.validator.validate(&url)).await {
            Ok(true) => Ok(url),
            Ok(false) | Err(_) => Err(FailureReason::ValidationFailed),
        }
    }
}
