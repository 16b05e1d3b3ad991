//! The music service: single entry point of the engine
//!
//! Owns the provider registry, the resolution cache, the coalescing
//! resolver, the preload scheduler and the aggregator. UI layers only ever
//! talk to a [`MusicService`].

use crate::aggregator::Aggregator;
use crate::cache::{Cache, CacheStats};
use crate::error::ServiceError;
use crate::preload::{EnqueueOutcome, PreloadPriority, PreloadScheduler};
use crate::registry::ProviderRegistry;
use crate::resolver::Resolver;
use crate::router::{FailoverRouter, ResolvedUrl};
use crate::validator::{HttpValidator, UrlValidator};
use std::sync::Arc;
use tfconfig::EngineSettings;
use tfprovider::{build_providers, BuildResult};
use tfsource::{
    MusicProvider, Page, Platform, Playlist, PlaylistCategory, PlaylistFilter, PlaylistPage,
    Track, TrackKey,
};
use tracing::{debug, info, warn};

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStats {
    pub cache: CacheStats,
    pub preload_queued: usize,
    pub in_flight: usize,
    pub providers: usize,
}

/// Checks a raw `(track id, platform tag)` pair coming from the UI
///
/// Ids are opaque but must be non-empty and free of whitespace, control
/// characters and `/`.
pub fn parse_track_key(track_id: &str, platform: &str) -> Result<TrackKey, ServiceError> {
    let valid = !track_id.is_empty()
        && !track_id
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '/');
    if !valid {
        return Err(ServiceError::InvalidTrackId(track_id.to_string()));
    }

    let platform = platform
        .parse::<Platform>()
        .map_err(|_| ServiceError::UnknownPlatform(platform.to_string()))?;

    Ok(TrackKey::new(platform, track_id))
}

pub struct MusicService {
    settings: EngineSettings,
    registry: Arc<ProviderRegistry>,
    resolver: Arc<Resolver>,
    scheduler: Arc<PreloadScheduler>,
    aggregator: Aggregator,
}

impl MusicService {
    /// Builds the providers and the HTTP validator from the settings
    ///
    /// Must be called from within a tokio runtime (preload workers are
    /// spawned right away).
    pub fn from_settings(settings: EngineSettings) -> BuildResult<Self> {
        let providers = build_providers(&settings)?;
        let validator = Arc::new(HttpValidator::with_timeout(settings.validation_timeout));
        Ok(Self::new(settings, providers, validator))
    }

    /// Providers are given in preference order
    pub fn new(
        settings: EngineSettings,
        providers: Vec<Arc<dyn MusicProvider>>,
        validator: Arc<dyn UrlValidator>,
    ) -> Self {
        let registry = Arc::new(ProviderRegistry::from_settings(providers, &settings));
        if registry.is_empty() {
            warn!("no provider configured, every request will fail");
        }

        let cache = Arc::new(Cache::new(settings.cache_ttl, settings.cache_max_entries));
        let router = Arc::new(FailoverRouter::new(registry.clone(), validator, &settings));
        let resolver = Arc::new(Resolver::new(router, cache));
        let scheduler = PreloadScheduler::spawn(
            resolver.clone(),
            settings.preload_queue_capacity,
            settings.preload_concurrency,
        );
        let aggregator = Aggregator::new(registry.clone(), &settings);

        info!(
            providers = registry.providers().len(),
            cache_ttl = ?settings.cache_ttl,
            cache_max_entries = settings.cache_max_entries,
            preload_concurrency = settings.preload_concurrency,
            "music service started"
        );

        Self {
            settings,
            registry,
            resolver,
            scheduler,
            aggregator,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    // ============= Search =============

    /// Aggregated search; the top results are queued for speculative preload
    pub async fn search(&self, keywords: &str) -> Result<Vec<Track>, ServiceError> {
        let tracks = self.aggregator.search(keywords).await?;
        self.preload_speculative(&tracks);
        Ok(tracks)
    }

    pub async fn hot_tracks(&self, limit: usize) -> Vec<Track> {
        let tracks = self.aggregator.hot_tracks(limit).await;
        self.preload_speculative(&tracks);
        tracks
    }

    fn preload_speculative(&self, tracks: &[Track]) {
        for track in tracks.iter().take(self.settings.speculative_preload_count) {
            self.scheduler.enqueue(track.key(), PreloadPriority::Speculative);
        }
    }

    // ============= Resolution =============

    /// Validated playable URL for a raw track id and platform tag
    pub async fn resolve(&self, track_id: &str, platform: &str) -> Result<ResolvedUrl, ServiceError> {
        let key = parse_track_key(track_id, platform)?;
        self.resolve_key(&key).await
    }

    pub async fn resolve_key(&self, key: &TrackKey) -> Result<ResolvedUrl, ServiceError> {
        Ok(self.resolver.resolve(key).await?)
    }

    /// Resolves `queue[index]` in the foreground, then queues its successor
    /// (wrapping to the start of the queue) for preloading
    pub async fn play(&self, queue: &[Track], index: usize) -> Result<ResolvedUrl, ServiceError> {
        let track = queue.get(index).ok_or(ServiceError::InvalidQueueIndex {
            index,
            len: queue.len(),
        })?;

        let result = self.resolve_key(&track.key()).await;

        if queue.len() > 1 {
            let next = &queue[(index + 1) % queue.len()];
            let outcome = self.scheduler.enqueue(next.key(), PreloadPriority::PredictedNext);
            debug!(track = %next.key(), ?outcome, "successor queued");
        }

        result
    }

    pub fn preload(&self, key: TrackKey, priority: PreloadPriority) -> EnqueueOutcome {
        self.scheduler.enqueue(key, priority)
    }

    /// Forgets the cached URL of `key`, typically after the player found it dead
    pub fn invalidate(&self, key: &TrackKey) -> bool {
        let removed = self.resolver.cache().invalidate(key).is_some();
        if removed {
            info!(track = %key, "cached url invalidated");
        }
        removed
    }

    // ============= Browsing =============

    pub async fn track_detail(&self, key: &TrackKey) -> Result<Track, ServiceError> {
        self.aggregator.track_detail(key.platform, &key.id).await
    }

    pub async fn browse_playlists(
        &self,
        platform: Platform,
        filter: &PlaylistFilter,
        page: Page,
    ) -> Result<PlaylistPage, ServiceError> {
        self.aggregator.browse_playlists(platform, filter, page).await
    }

    pub async fn playlist_detail(&self, platform: Platform, playlist_id: &str) -> Result<Playlist, ServiceError> {
        self.aggregator.playlist_detail(platform, playlist_id).await
    }

    /// Playlist with its tracks loaded
    pub async fn playlist_with_tracks(&self, platform: Platform, playlist_id: &str) -> Result<Playlist, ServiceError> {
        let mut playlist = self.playlist_detail(platform, playlist_id).await?;
        playlist.tracks = Some(self.playlist_tracks(platform, playlist_id).await?);
        Ok(playlist)
    }

    pub async fn playlist_tracks(&self, platform: Platform, playlist_id: &str) -> Result<Vec<Track>, ServiceError> {
        self.aggregator.playlist_tracks(platform, playlist_id).await
    }

    pub async fn playlist_categories(&self, platform: Platform) -> Result<Vec<PlaylistCategory>, ServiceError> {
        self.aggregator.playlist_categories(platform).await
    }

    // ============= Lifecycle =============

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            cache: self.resolver.cache().stats(),
            preload_queued: self.scheduler.len(),
            in_flight: self.resolver.in_flight(),
            providers: self.registry.providers().len(),
        }
    }

    /// Stops the preload workers; later preload requests are rejected
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("music service stopped");
    }
}
