//! Typed view over the `engine` section of the configuration
//!
//! The raw YAML section is deserialized into [`EngineSection`] (all keys
//! optional, lowercased like the rest of the configuration tree) and then
//! normalized into [`EngineSettings`], where every value is present and
//! clamped into a usable range.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CACHE_TTL_MS: u64 = 30 * 60 * 1000;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 200;
pub const DEFAULT_PRELOAD_CONCURRENCY: usize = 1;
pub const DEFAULT_PRELOAD_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_VALIDATION_TIMEOUT_MS: u64 = 2_500;
pub const DEFAULT_MAX_PROVIDERS_PER_REQUEST: usize = 3;
pub const DEFAULT_DEMOTE_AFTER_FAILURES: u32 = 3;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_SEARCH_MAX_PAGES: usize = 10;
pub const DEFAULT_SEARCH_CACHE_TTL_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_SPECULATIVE_PRELOAD_COUNT: usize = 5;

/// Shortest timeout accepted for any network deadline
const MIN_TIMEOUT_MS: u64 = 100;

/// One configured provider endpoint, as written in the YAML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub struct ProviderEndpoint {
    /// Unique provider id, used in logs and in the preference order
    pub name: String,
    /// Platform tag (`netease`, `youtube`, `kugou`)
    pub platform: String,
    /// Base URL of the REST API
    pub baseurl: String,
    /// Per-provider timeout, falls back to `providerTimeoutMs`
    #[serde(default)]
    pub timeoutms: Option<u64>,
}

impl ProviderEndpoint {
    pub fn new(name: impl Into<String>, platform: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: platform.into(),
            baseurl: base_url.into(),
            timeoutms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeoutms = Some(timeout_ms);
        self
    }
}

/// Raw `engine` section; keys are lowercased by the loader
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", default)]
pub struct EngineSection {
    pub providerendpoints: Option<Vec<ProviderEndpoint>>,
    pub cachettlms: Option<u64>,
    pub cachemaxentries: Option<usize>,
    pub preloadconcurrency: Option<usize>,
    pub preloadqueuecapacity: Option<usize>,
    pub providertimeoutms: Option<u64>,
    pub validationtimeoutms: Option<u64>,
    pub maxprovidersperrequest: Option<usize>,
    pub demoteafterfailures: Option<u32>,
    pub retrymaxattempts: Option<u32>,
    pub retrybackoffms: Option<u64>,
    pub searchmaxpages: Option<usize>,
    pub searchcachettlms: Option<u64>,
    pub speculativepreloadcount: Option<usize>,
}

/// Fully resolved engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub provider_endpoints: Vec<ProviderEndpoint>,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub preload_concurrency: usize,
    pub preload_queue_capacity: usize,
    pub provider_timeout: Duration,
    pub validation_timeout: Duration,
    pub max_providers_per_request: usize,
    pub demote_after_failures: u32,
    pub retry_max_attempts: u32,
    pub retry_backoff: Duration,
    pub search_max_pages: usize,
    pub search_cache_ttl: Duration,
    pub speculative_preload_count: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSection::default().into_settings()
    }
}

impl EngineSettings {
    /// Timeout to use for one endpoint, honouring its own override
    pub fn timeout_for(&self, endpoint: &ProviderEndpoint) -> Duration {
        endpoint
            .timeoutms
            .map(|ms| Duration::from_millis(ms.max(MIN_TIMEOUT_MS)))
            .unwrap_or(self.provider_timeout)
    }
}

impl EngineSection {
    /// Fills the gaps with defaults and clamps out-of-range values
    pub fn into_settings(self) -> EngineSettings {
        let retry_max_attempts = match self.retrymaxattempts {
            Some(n @ 1..=2) => n,
            Some(n) => {
                warn!(value = n, "retryMaxAttempts must be 1 or 2, clamping");
                n.clamp(1, 2)
            }
            None => DEFAULT_RETRY_MAX_ATTEMPTS,
        };

        EngineSettings {
            provider_endpoints: self.providerendpoints.unwrap_or_default(),
            cache_ttl: millis(self.cachettlms, DEFAULT_CACHE_TTL_MS),
            cache_max_entries: at_least_one(self.cachemaxentries, DEFAULT_CACHE_MAX_ENTRIES),
            preload_concurrency: at_least_one(self.preloadconcurrency, DEFAULT_PRELOAD_CONCURRENCY),
            preload_queue_capacity: at_least_one(
                self.preloadqueuecapacity,
                DEFAULT_PRELOAD_QUEUE_CAPACITY,
            ),
            provider_timeout: millis(self.providertimeoutms, DEFAULT_PROVIDER_TIMEOUT_MS),
            validation_timeout: millis(self.validationtimeoutms, DEFAULT_VALIDATION_TIMEOUT_MS),
            max_providers_per_request: at_least_one(
                self.maxprovidersperrequest,
                DEFAULT_MAX_PROVIDERS_PER_REQUEST,
            ),
            demote_after_failures: self
                .demoteafterfailures
                .unwrap_or(DEFAULT_DEMOTE_AFTER_FAILURES)
                .max(1),
            retry_max_attempts,
            retry_backoff: Duration::from_millis(
                self.retrybackoffms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
            ),
            search_max_pages: at_least_one(self.searchmaxpages, DEFAULT_SEARCH_MAX_PAGES),
            search_cache_ttl: Duration::from_millis(
                self.searchcachettlms.unwrap_or(DEFAULT_SEARCH_CACHE_TTL_MS),
            ),
            speculative_preload_count: self
                .speculativepreloadcount
                .unwrap_or(DEFAULT_SPECULATIVE_PRELOAD_COUNT),
        }
    }
}

fn millis(value: Option<u64>, default: u64) -> Duration {
    Duration::from_millis(value.unwrap_or(default).max(MIN_TIMEOUT_MS))
}

fn at_least_one(value: Option<usize>, default: usize) -> usize {
    value.unwrap_or(default).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_section_uses_defaults() {
        let settings = EngineSection::default().into_settings();
        assert_eq!(settings.cache_ttl, Duration::from_secs(30 * 60));
        assert_eq!(settings.cache_max_entries, 200);
        assert_eq!(settings.preload_concurrency, 1);
        assert_eq!(settings.retry_max_attempts, 2);
        assert_eq!(settings.retry_backoff, Duration::from_secs(1));
        assert!(settings.provider_endpoints.is_empty());
    }

    #[test]
    fn test_values_are_clamped() {
        let section = EngineSection {
            cachemaxentries: Some(0),
            retrymaxattempts: Some(7),
            providertimeoutms: Some(1),
            demoteafterfailures: Some(0),
            ..Default::default()
        };
        let settings = section.into_settings();
        assert_eq!(settings.cache_max_entries, 1);
        assert_eq!(settings.retry_max_attempts, 2);
        assert_eq!(settings.provider_timeout, Duration::from_millis(MIN_TIMEOUT_MS));
        assert_eq!(settings.demote_after_failures, 1);
    }

    #[test]
    fn test_endpoint_timeout_override() {
        let settings = EngineSettings::default();
        let plain = ProviderEndpoint::new("a", "netease", "http://a");
        let slow = ProviderEndpoint::new("b", "youtube", "http://b").with_timeout_ms(15_000);
        assert_eq!(settings.timeout_for(&plain), settings.provider_timeout);
        assert_eq!(settings.timeout_for(&slow), Duration::from_secs(15));
    }
}
