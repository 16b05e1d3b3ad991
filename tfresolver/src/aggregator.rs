//! Aggregated search and playlist browsing
//!
//! Searches fan out to every registered provider at once; a provider that
//! fails or runs out of time contributes nothing. Results are merged in
//! registration order, deduplicated by track key (first seen wins) and
//! sorted by title then first artist. Only a search every provider
//! answered is memoized, and never an empty one.
//!
//! Browse calls are metadata lookups on one platform: they walk the
//! platform's providers in preference order and return the first success.
//! Providers whose [`ProviderCapabilities`] exclude an operation are
//! skipped without a call.

use crate::error::{AttemptFailure, FailureReason, ServiceError};
use crate::registry::ProviderRegistry;
use futures::future::join_all;
use moka::future::Cache as MokaCache;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tfconfig::EngineSettings;
use tfsource::{
    MusicProvider, Page, Platform, Playlist, PlaylistCategory, PlaylistFilter, PlaylistPage,
    ProviderCapabilities, Result as ProviderResult, Track,
};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Distinct keyword sets memoized at once
const SEARCH_CACHE_CAPACITY: u64 = 256;

/// Capability filter for the operations every provider serves
fn any_provider(_: &ProviderCapabilities) -> bool {
    true
}

/// Per-provider lists of a fan-out, in registration order
struct FanOut {
    lists: Vec<Vec<Track>>,
    /// No provider failed or timed out
    complete: bool,
}

pub struct Aggregator {
    registry: Arc<ProviderRegistry>,
    searches: MokaCache<String, Arc<Vec<Track>>>,
    max_providers: usize,
    retry_backoff: Duration,
}

impl Aggregator {
    pub fn new(registry: Arc<ProviderRegistry>, settings: &EngineSettings) -> Self {
        Self {
            registry,
            searches: MokaCache::builder()
                .max_capacity(SEARCH_CACHE_CAPACITY)
                .time_to_live(settings.search_cache_ttl)
                .build(),
            max_providers: settings.max_providers_per_request.max(1),
            retry_backoff: settings.retry_backoff,
        }
    }

    /// Merged, deduplicated and sorted results of every provider
    pub async fn search(&self, keywords: &str) -> Result<Vec<Track>, ServiceError> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Err(ServiceError::InvalidKeywords);
        }

        let memo_key = keywords.to_lowercase();
        if let Some(hit) = self.searches.get(&memo_key).await {
            debug!(keywords, count = hit.len(), "search memo hit");
            return Ok(hit.as_ref().clone());
        }

        let FanOut { lists, complete } = self
            .fan_out("search", any_provider, |provider| {
                let keywords = keywords.to_string();
                async move { provider.search(&keywords).await }
            })
            .await;

        let mut tracks = merge_tracks(lists);
        sort_tracks(&mut tracks);

        debug!(keywords, count = tracks.len(), complete, "search merged");
        if complete && !tracks.is_empty() {
            self.searches.insert(memo_key, Arc::new(tracks.clone())).await;
        }
        Ok(tracks)
    }

    /// Recommended tracks of every provider, provider order kept
    pub async fn hot_tracks(&self, limit: usize) -> Vec<Track> {
        let FanOut { lists, .. } = self
            .fan_out(
                "hot_tracks",
                |caps| caps.supports_hot_tracks,
                |provider| async move { provider.hot_tracks(limit).await },
            )
            .await;

        let mut tracks = merge_tracks(lists);
        tracks.truncate(limit);
        tracks
    }

    /// Full record of one track from the first provider that has it
    pub async fn track_detail(&self, platform: Platform, track_id: &str) -> Result<Track, ServiceError> {
        self.first_success(platform, "fetch_detail", any_provider, |provider| {
            let id = track_id.to_string();
            async move { provider.fetch_detail(&id).await }
        })
        .await
    }

    pub async fn browse_playlists(
        &self,
        platform: Platform,
        filter: &PlaylistFilter,
        page: Page,
    ) -> Result<PlaylistPage, ServiceError> {
        self.first_success(
            platform,
            "browse_playlists",
            |caps| caps.supports_playlists,
            |provider| {
                let filter = filter.clone();
                async move { provider.browse_playlists(&filter, page).await }
            },
        )
        .await
    }

    pub async fn playlist_detail(&self, platform: Platform, playlist_id: &str) -> Result<Playlist, ServiceError> {
        self.first_success(
            platform,
            "playlist_detail",
            |caps| caps.supports_playlists,
            |provider| {
                let id = playlist_id.to_string();
                async move { provider.playlist_detail(&id).await }
            },
        )
        .await
    }

    pub async fn playlist_tracks(&self, platform: Platform, playlist_id: &str) -> Result<Vec<Track>, ServiceError> {
        self.first_success(
            platform,
            "playlist_tracks",
            |caps| caps.supports_playlists,
            |provider| {
                let id = playlist_id.to_string();
                async move { provider.playlist_tracks(&id).await }
            },
        )
        .await
    }

    pub async fn playlist_categories(&self, platform: Platform) -> Result<Vec<PlaylistCategory>, ServiceError> {
        self.first_success(
            platform,
            "playlist_categories",
            |caps| caps.supports_categories,
            |provider| async move { provider.playlist_categories().await },
        )
        .await
    }

    /// Runs `op` concurrently on every provider `serves` accepts; failures
    /// become empty lists and mark the fan-out incomplete
    async fn fan_out<F, Fut>(
        &self,
        operation: &'static str,
        serves: fn(&ProviderCapabilities) -> bool,
        op: F,
    ) -> FanOut
    where
        F: Fn(Arc<dyn MusicProvider>) -> Fut,
        Fut: Future<Output = ProviderResult<Vec<Track>>>,
    {
        let calls = self
            .registry
            .providers()
            .iter()
            .filter(|(provider, _)| serves(&provider.capabilities()))
            .map(|(provider, budget)| {
                let call = op(provider.clone());
                let deadline = *budget + self.retry_backoff;
                async move {
                    match timeout(deadline, call).await {
                        Ok(Ok(tracks)) => Some(tracks),
                        Ok(Err(e)) if e.is_unsupported() => Some(Vec::new()),
                        Ok(Err(e)) => {
                            warn!(provider = provider.id(), operation, error = %e, "provider failed");
                            None
                        }
                        Err(_) => {
                            warn!(provider = provider.id(), operation, "provider timed out after {:?}", deadline);
                            None
                        }
                    }
                }
            });

        let outcomes = join_all(calls).await;
        let complete = outcomes.iter().all(Option::is_some);
        FanOut {
            lists: outcomes.into_iter().map(Option::unwrap_or_default).collect(),
            complete,
        }
    }

    /// Walks the platform's providers until one answers
    async fn first_success<T, F, Fut>(
        &self,
        platform: Platform,
        operation: &'static str,
        serves: fn(&ProviderCapabilities) -> bool,
        op: F,
    ) -> Result<T, ServiceError>
    where
        F: Fn(Arc<dyn MusicProvider>) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let candidates = self.registry.candidates(platform, self.max_providers);
        let mut attempts = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let provider_id = candidate.id().to_string();
            if !serves(&candidate.provider.capabilities()) {
                debug!(provider = %provider_id, operation, "not served, skipped");
                attempts.push(AttemptFailure::new(
                    provider_id,
                    FailureReason::ProviderUnavailable(format!("{} not supported", operation)),
                ));
                continue;
            }
            let deadline = candidate.timeout + self.retry_backoff;

            let reason = match timeout(deadline, op(candidate.provider.clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => FailureReason::ProviderUnavailable(e.to_string()),
                Err(_) => FailureReason::TimedOut,
            };

            warn!(provider = %provider_id, operation, "browse attempt failed: {}", reason);
            attempts.push(AttemptFailure::new(provider_id, reason));
        }

        Err(ServiceError::BrowseFailed {
            platform,
            operation,
            attempts,
        })
    }
}

/// Concatenates in order, keeping the first occurrence of each track key
pub fn merge_tracks(lists: Vec<Vec<Track>>) -> Vec<Track> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|track| seen.insert(track.key()))
        .collect()
}

/// Stable sort by title then first artist, see [`compare_text`]
pub fn sort_tracks(tracks: &mut [Track]) {
    tracks.sort_by(|a, b| {
        compare_text(&a.name, &b.name).then_with(|| compare_text(a.first_artist(), b.first_artist()))
    });
}

/// Case- and accent-insensitive comparison, exact comparison as tie-break
pub fn compare_text(a: &str, b: &str) -> Ordering {
    let folded = a.chars().flat_map(fold_char).cmp(b.chars().flat_map(fold_char));
    folded.then_with(|| a.cmp(b))
}

fn fold_char(c: char) -> std::char::ToLowercase {
    strip_accent(c).to_lowercase()
}

/// Base letter of the accented Latin-1 and Latin Extended-A letters
fn strip_accent(c: char) -> char {
    match c {
        'À'..='Å' | 'à'..='å' | 'Ā' | 'ā' | 'Ă' | 'ă' | 'Ą' | 'ą' => 'a',
        'Ç' | 'ç' | 'Ć' | 'ć' | 'Č' | 'č' => 'c',
        'Ď' | 'ď' => 'd',
        'È'..='Ë' | 'è'..='ë' | 'Ē' | 'ē' | 'Ė' | 'ė' | 'Ę' | 'ę' | 'Ě' | 'ě' => 'e',
        'Ğ' | 'ğ' => 'g',
        'Ì'..='Ï' | 'ì'..='ï' | 'Ī' | 'ī' | 'İ' | 'ı' => 'i',
        'Ł' | 'ł' => 'l',
        'Ñ' | 'ñ' | 'Ń' | 'ń' | 'Ň' | 'ň' => 'n',
        'Ò'..='Ö' | 'Ø' | 'ò'..='ö' | 'ø' | 'Ō' | 'ō' | 'Ő' | 'ő' => 'o',
        'Ř' | 'ř' => 'r',
        'Ś' | 'ś' | 'Ş' | 'ş' | 'Š' | 'š' => 's',
        'Ť' | 'ť' | 'Ţ' | 'ţ' => 't',
        'Ù'..='Ü' | 'ù'..='ü' | 'Ū' | 'ū' | 'Ů' | 'ů' | 'Ű' | 'ű' => 'u',
        'Ý' | 'ý' | 'ÿ' | 'Ÿ' => 'y',
        'Ź' | 'ź' | 'Ż' | 'ż' | 'Ž' | 'ž' => 'z',
        _ => c,
    }
}
