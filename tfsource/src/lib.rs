//! # TFSource
//!
//! Common traits and types for TuneFuse music providers.
//!
//! Every external platform (and every mirror of a platform) is exposed to
//! the engine as a [`MusicProvider`]. Providers return canonical
//! [`Track`] / [`Playlist`] records; their wire formats stay private to the
//! implementing crate.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tfsource::{MusicProvider, Platform, Result, Track};
//!
//! #[derive(Debug)]
//! struct Static;
//!
//! #[async_trait::async_trait]
//! impl MusicProvider for Static {
//!     fn id(&self) -> &str { "static" }
//!     fn platform(&self) -> Platform { Platform::Netease }
//!     fn base_url(&self) -> &str { "memory://" }
//!
//!     async fn search(&self, _keywords: &str) -> Result<Vec<Track>> {
//!         Ok(vec![])
//!     }
//!
//!     async fn resolve_url(&self, track_id: &str) -> Result<String> {
//!         Ok(format!("http://example.com/{track_id}.mp3"))
//!     }
//!
//!     async fn fetch_detail(&self, track_id: &str) -> Result<Track> {
//!         Err(tfsource::ProviderError::NotFound(track_id.to_string()))
//!     }
//! }
//! ```

pub mod error;
pub mod models;

use async_trait::async_trait;
use std::fmt::Debug;

pub use error::{ProviderError, Result};
pub use models::{
    Album, Artist, Creator, Page, Playability, Platform, Playlist, PlaylistCategory,
    PlaylistFilter, PlaylistOrder, PlaylistPage, Track, TrackKey,
};

/// Capabilities describing which optional operations a provider serves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Serves `hot_tracks`
    pub supports_hot_tracks: bool,
    /// Serves the playlist browsing operations
    pub supports_playlists: bool,
    /// Serves `playlist_categories`
    pub supports_categories: bool,
}

/// Main trait for music providers
///
/// One instance per external endpoint. Implementations must never panic on
/// a bad response; every failure is a [`ProviderError`].
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; the engine shares them
/// across tasks behind `Arc<dyn MusicProvider>`.
#[async_trait]
pub trait MusicProvider: Debug + Send + Sync {
    // ============= Identification =============

    /// Unique identifier of this endpoint (e.g. `netease-mirror-2`)
    fn id(&self) -> &str;

    /// Platform whose tracks this endpoint serves
    fn platform(&self) -> Platform;

    /// Base URL of the endpoint, for diagnostics
    fn base_url(&self) -> &str;

    /// Optional operations supported by this provider
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    // ============= Core operations =============

    /// Keyword search
    async fn search(&self, keywords: &str) -> Result<Vec<Track>>;

    /// Resolves a streaming URL for a track of this provider's platform
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] when the provider has no playable
    /// URL for the track.
    async fn resolve_url(&self, track_id: &str) -> Result<String>;

    /// Fetches the full record of one track
    async fn fetch_detail(&self, track_id: &str) -> Result<Track>;

    // ============= Browsing =============

    /// Recommended / trending tracks
    async fn hot_tracks(&self, limit: usize) -> Result<Vec<Track>> {
        let _ = limit;
        Err(ProviderError::Unsupported("hot_tracks"))
    }

    /// One page of playlists matching the filter
    async fn browse_playlists(&self, filter: &PlaylistFilter, page: Page) -> Result<PlaylistPage> {
        let _ = (filter, page);
        Err(ProviderError::Unsupported("browse_playlists"))
    }

    /// Playlist metadata, without tracks
    async fn playlist_detail(&self, playlist_id: &str) -> Result<Playlist> {
        let _ = playlist_id;
        Err(ProviderError::Unsupported("playlist_detail"))
    }

    /// Ordered tracks of a playlist
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let _ = playlist_id;
        Err(ProviderError::Unsupported("playlist_tracks"))
    }

    /// Categories available for browsing
    async fn playlist_categories(&self) -> Result<Vec<PlaylistCategory>> {
        Err(ProviderError::Unsupported("playlist_categories"))
    }
}
