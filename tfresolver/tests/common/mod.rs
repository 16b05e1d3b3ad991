//! Scripted in-process providers and validator shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tfconfig::{EngineSection, EngineSettings};
use tfresolver::UrlValidator;
use tfsource::{
    Album, Artist, Creator, MusicProvider, Page, Playability, Platform, Playlist,
    PlaylistFilter, PlaylistPage, ProviderCapabilities, ProviderError, Result, Track,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Ok,
    Fail,
    Hang,
}

#[derive(Debug)]
pub struct FakeProvider {
    id: String,
    platform: Platform,
    mode: Mode,
    delay: Duration,
    tracks: Vec<Track>,
    fail_ids: Vec<String>,
    failing_searches: AtomicUsize,
    capabilities: ProviderCapabilities,
    resolved: Mutex<Vec<String>>,
    search_calls: AtomicUsize,
    browse_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(id: &str, platform: Platform) -> Self {
        Self {
            id: id.to_string(),
            platform,
            mode: Mode::Ok,
            delay: Duration::ZERO,
            tracks: Vec::new(),
            fail_ids: Vec::new(),
            failing_searches: AtomicUsize::new(0),
            capabilities: ProviderCapabilities {
                supports_hot_tracks: true,
                supports_playlists: true,
                supports_categories: true,
            },
            resolved: Mutex::new(Vec::new()),
            search_calls: AtomicUsize::new(0),
            browse_calls: AtomicUsize::new(0),
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Latency of every call
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn tracks(mut self, tracks: Vec<Track>) -> Self {
        self.tracks = tracks;
        self
    }

    pub fn fail_on(mut self, track_id: &str) -> Self {
        self.fail_ids.push(track_id.to_string());
        self
    }

    /// The first `count` searches fail as transient errors
    pub fn fail_searches(self, count: usize) -> Self {
        self.failing_searches.store(count, Ordering::SeqCst);
        self
    }

    /// Defaults to every optional operation
    pub fn serving(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolved.lock().len()
    }

    pub fn resolved_ids(&self) -> Vec<String> {
        self.resolved.lock().clone()
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn browse_calls(&self) -> usize {
        self.browse_calls.load(Ordering::SeqCst)
    }

    pub fn url_for(&self, track_id: &str) -> String {
        format!("http://{}/{}.mp3", self.id, track_id)
    }

    async fn behave(&self) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        match self.mode {
            Mode::Ok => Ok(()),
            Mode::Fail => Err(ProviderError::Transient(format!("{} is down", self.id))),
            Mode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Transient("hung".into()))
            }
        }
    }
}

#[async_trait]
impl MusicProvider for FakeProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn base_url(&self) -> &str {
        "memory://"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities.clone()
    }

    async fn search(&self, _keywords: &str) -> Result<Vec<Track>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.behave().await?;
        let failing = self
            .failing_searches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProviderError::Transient(format!("{} search outage", self.id)));
        }
        Ok(self.tracks.clone())
    }

    async fn resolve_url(&self, track_id: &str) -> Result<String> {
        self.resolved.lock().push(track_id.to_string());
        self.behave().await?;
        if self.fail_ids.iter().any(|id| id == track_id) {
            return Err(ProviderError::NotFound(track_id.to_string()));
        }
        Ok(self.url_for(track_id))
    }

    async fn fetch_detail(&self, track_id: &str) -> Result<Track> {
        self.behave().await?;
        self.tracks
            .iter()
            .find(|t| t.id == track_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(track_id.to_string()))
    }

    async fn hot_tracks(&self, limit: usize) -> Result<Vec<Track>> {
        self.behave().await?;
        Ok(self.tracks.iter().take(limit).cloned().collect())
    }

    async fn browse_playlists(&self, _filter: &PlaylistFilter, _page: Page) -> Result<PlaylistPage> {
        self.browse_calls.fetch_add(1, Ordering::SeqCst);
        self.behave().await?;
        Ok(PlaylistPage {
            playlists: vec![playlist(&self.id, self.platform)],
            total: Some(1),
            has_more: false,
        })
    }

    async fn playlist_detail(&self, playlist_id: &str) -> Result<Playlist> {
        self.browse_calls.fetch_add(1, Ordering::SeqCst);
        self.behave().await?;
        Ok(playlist(playlist_id, self.platform))
    }

    async fn playlist_tracks(&self, _playlist_id: &str) -> Result<Vec<Track>> {
        self.browse_calls.fetch_add(1, Ordering::SeqCst);
        self.behave().await?;
        Ok(self.tracks.clone())
    }
}

/// Accepts every URL except those containing one of the rejected fragments
#[derive(Debug, Default)]
pub struct FakeValidator {
    rejected: Vec<String>,
    probes: AtomicUsize,
}

impl FakeValidator {
    pub fn accept_all() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting(fragments: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            rejected: fragments.iter().map(|f| f.to_string()).collect(),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UrlValidator for FakeValidator {
    async fn validate(&self, url: &str) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        !self.rejected.iter().any(|fragment| url.contains(fragment.as_str()))
    }
}

pub fn track(platform: Platform, id: &str, name: &str, artist: &str) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        artists: vec![Artist::named(artist)],
        album: Album::default(),
        duration_ms: 180_000,
        platform,
        playability: Playability::default(),
    }
}

pub fn playlist(id: &str, platform: Platform) -> Playlist {
    Playlist {
        id: id.to_string(),
        name: format!("playlist {}", id),
        description: None,
        cover_url: None,
        track_count: 0,
        play_count: 0,
        creator: Creator::default(),
        tags: Vec::new(),
        platform,
        tracks: None,
    }
}

/// 1 s provider timeout, 100 ms retry backoff, 500 ms validation timeout
pub fn settings() -> EngineSettings {
    section().into_settings()
}

pub fn section() -> EngineSection {
    EngineSection {
        providertimeoutms: Some(1_000),
        retrybackoffms: Some(100),
        validationtimeoutms: Some(500),
        ..Default::default()
    }
}

pub fn providers(list: &[&Arc<FakeProvider>]) -> Vec<Arc<dyn MusicProvider>> {
    list.iter()
        .map(|p| (*p).clone() as Arc<dyn MusicProvider>)
        .collect()
}
