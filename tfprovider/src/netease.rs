//! Client for NetEase-compatible music APIs
//!
//! The same REST surface is exposed by the primary endpoint and by every
//! mirror; each configured endpoint gets its own [`NeteaseProvider`].

use crate::http::HttpApi;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tfsource::models::deserialize_id;
use tfsource::{
    Album, Artist, Creator, MusicProvider, Page, Playability, Platform, Playlist,
    PlaylistCategory, PlaylistFilter, PlaylistPage, ProviderCapabilities, ProviderError, Result,
    Track,
};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

/// Songs per search page
pub const SEARCH_PAGE_SIZE: usize = 100;

/// Search pages requested concurrently
pub const SEARCH_BATCH_SIZE: usize = 5;

/// Tracks per `/playlist/track/all` page
const PLAYLIST_TRACKS_PAGE_SIZE: usize = 500;
const PLAYLIST_TRACKS_MAX_PAGES: usize = 20;

/// Category sent when the filter names none
pub const ALL_CATEGORY: &str = "全部";

/// NetEase `fee` values meaning "subscription only"
const SUBSCRIPTION_FEES: [i64; 2] = [1, 4];

#[derive(Debug)]
pub struct NeteaseProvider {
    id: String,
    platform: Platform,
    api: HttpApi,
    search_max_pages: usize,
    search_budget: Duration,
}

impl NeteaseProvider {
    pub(crate) fn new(
        id: String,
        api: HttpApi,
        search_max_pages: usize,
        search_budget: Duration,
    ) -> Self {
        Self {
            id,
            platform: Platform::Netease,
            api,
            search_max_pages: search_max_pages.max(1),
            search_budget,
        }
    }

    /// One search page; a failed page contributes nothing
    async fn search_page(&self, keywords: &str, page: usize) -> Vec<Track> {
        let params = [
            ("keywords", keywords.to_string()),
            ("limit", SEARCH_PAGE_SIZE.to_string()),
            ("type", "1".to_string()),
            ("offset", (page * SEARCH_PAGE_SIZE).to_string()),
        ];

        let songs = match self.api.get::<SearchEnvelope>("/search", &params).await {
            Ok(envelope) => envelope.result.and_then(|r| r.songs).unwrap_or_default(),
            Err(e) => {
                warn!(provider = %self.id, page, error = %e, "search page failed");
                return Vec::new();
            }
        };

        let covers = self.backfill_covers(&songs).await;

        songs
            .into_iter()
            .filter_map(|song| {
                let cover = covers.get(&song.id).cloned();
                let mut track = song.into_track(self.platform)?;
                if track.album.cover_url.is_none() {
                    track.album.cover_url = cover;
                }
                Some(track)
            })
            .collect()
    }

    /// Album art for the songs that came back without one
    async fn backfill_covers(&self, songs: &[WireSong]) -> HashMap<String, String> {
        let missing: Vec<&str> = songs
            .iter()
            .filter(|s| s.cover_url().is_none())
            .map(|s| s.id.as_str())
            .collect();

        if missing.is_empty() {
            return HashMap::new();
        }

        let params = [("ids", missing.join(","))];
        match self.api.get::<SongsEnvelope>("/song/detail", &params).await {
            Ok(envelope) => envelope
                .songs
                .unwrap_or_default()
                .into_iter()
                .filter_map(|s| {
                    let cover = s.cover_url()?.to_string();
                    Some((s.id, cover))
                })
                .collect(),
            Err(e) => {
                debug!(provider = %self.id, error = %e, "cover backfill failed, ignored");
                HashMap::new()
            }
        }
    }

    fn into_tracks(&self, songs: Option<Vec<WireSong>>) -> Vec<Track> {
        songs
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| s.into_track(self.platform))
            .collect()
    }
}

#[async_trait]
impl MusicProvider for NeteaseProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn base_url(&self) -> &str {
        self.api.base_url()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_hot_tracks: true,
            supports_playlists: true,
            supports_categories: true,
        }
    }

    async fn search(&self, keywords: &str) -> Result<Vec<Track>> {
        let deadline = Instant::now() + self.search_budget;
        let params = [
            ("keywords", keywords.to_string()),
            ("limit", "1".to_string()),
            ("type", "1".to_string()),
        ];
        let count: SearchEnvelope = self.api.get("/search", &params).await?;
        let total = count.result.and_then(|r| r.song_count).unwrap_or(0) as usize;
        let pages = total.div_ceil(SEARCH_PAGE_SIZE).min(self.search_max_pages);

        debug!(provider = %self.id, total, pages, "searching {:?}", keywords);

        let page_numbers: Vec<usize> = (0..pages).collect();
        let mut gathered: Vec<Option<Vec<Track>>> = vec![None; pages];

        'batches: for batch in page_numbers.chunks(SEARCH_BATCH_SIZE) {
            let mut pending: FuturesUnordered<_> = batch
                .iter()
                .map(|&page| async move { (page, self.search_page(keywords, page).await) })
                .collect();

            loop {
                match timeout_at(deadline, pending.next()).await {
                    Ok(Some((page, found))) => gathered[page] = Some(found),
                    Ok(None) => break,
                    Err(_) => {
                        let kept = gathered.iter().filter(|p| p.is_some()).count();
                        warn!(
                            provider = %self.id,
                            kept,
                            pages,
                            "search budget spent, returning gathered pages"
                        );
                        break 'batches;
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        Ok(gathered
            .into_iter()
            .flatten()
            .flatten()
            .filter(|track| seen.insert(track.id.clone()))
            .collect())
    }

    async fn resolve_url(&self, track_id: &str) -> Result<String> {
        let params = [
            ("id", track_id.to_string()),
            ("level", "standard".to_string()),
            ("timestamp", chrono::Utc::now().timestamp_millis().to_string()),
        ];
        let envelope: UrlEnvelope = self.api.get("/song/url/v1", &params).await?;

        envelope
            .data
            .and_then(|data| data.into_iter().next())
            .and_then(|d| d.url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::NotFound(format!("no playable url for {}", track_id)))
    }

    async fn fetch_detail(&self, track_id: &str) -> Result<Track> {
        let params = [("ids", track_id.to_string())];
        let envelope: SongsEnvelope = self.api.get("/song/detail", &params).await?;

        self.into_tracks(envelope.songs)
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(format!("track {}", track_id)))
    }

    async fn hot_tracks(&self, limit: usize) -> Result<Vec<Track>> {
        let params = [("limit", limit.to_string())];
        let envelope: NewSongEnvelope = self.api.get("/personalized/newsong", &params).await?;

        Ok(envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let mut song = item.song;
                song.id = item.id;
                if song.name.is_none() {
                    song.name = item.name;
                }
                song.into_track(self.platform)
            })
            .collect())
    }

    async fn browse_playlists(&self, filter: &PlaylistFilter, page: Page) -> Result<PlaylistPage> {
        let params = [
            ("limit", page.limit.to_string()),
            ("offset", page.offset.to_string()),
            ("cat", filter.category.clone().unwrap_or_else(|| ALL_CATEGORY.to_string())),
            ("order", filter.order.as_str().to_string()),
        ];
        let envelope: TopPlaylistEnvelope = self.api.get("/top/playlist", &params).await?;

        let playlists: Vec<Playlist> = envelope
            .playlists
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.into_playlist(self.platform))
            .collect();

        let has_more = envelope.more.unwrap_or_else(|| {
            envelope
                .total
                .is_some_and(|total| (page.offset.saturating_add(playlists.len()) as u64) < total)
        });

        Ok(PlaylistPage {
            playlists,
            total: envelope.total,
            has_more,
        })
    }

    async fn playlist_detail(&self, playlist_id: &str) -> Result<Playlist> {
        let params = [("id", playlist_id.to_string())];
        let envelope: PlaylistDetailEnvelope = self.api.get("/playlist/detail", &params).await?;

        envelope
            .playlist
            .map(|p| p.into_playlist(self.platform))
            .ok_or_else(|| ProviderError::NotFound(format!("playlist {}", playlist_id)))
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let mut tracks = Vec::new();

        for page in 0..PLAYLIST_TRACKS_MAX_PAGES {
            let params = [
                ("id", playlist_id.to_string()),
                ("limit", PLAYLIST_TRACKS_PAGE_SIZE.to_string()),
                ("offset", (page * PLAYLIST_TRACKS_PAGE_SIZE).to_string()),
            ];
            let envelope: SongsEnvelope = self.api.get("/playlist/track/all", &params).await?;
            let songs = envelope.songs.unwrap_or_default();
            let received = songs.len();

            tracks.extend(self.into_tracks(Some(songs)));

            if received < PLAYLIST_TRACKS_PAGE_SIZE {
                break;
            }
        }

        Ok(tracks)
    }

    async fn playlist_categories(&self) -> Result<Vec<PlaylistCategory>> {
        let envelope: CatlistEnvelope = self.api.get("/playlist/catlist", &[]).await?;
        let groups = envelope.categories.unwrap_or_default();

        Ok(envelope
            .sub
            .unwrap_or_default()
            .into_iter()
            .map(|c| PlaylistCategory {
                group: c.category.and_then(|idx| groups.get(&idx.to_string()).cloned()),
                name: c.name,
                hot: c.hot.unwrap_or(false),
            })
            .collect())
    }
}

// ============================================================================
// Wire format
// ============================================================================

fn value_id(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct WireArtist {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAlbum {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    pic_url: Option<String>,
}

/// Song as returned by `/search` (`artists`, `album`, `duration`) and by
/// the detail endpoints (`ar`, `al`, `dt`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSong {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "ar")]
    artists: Option<Vec<WireArtist>>,
    #[serde(default, alias = "al")]
    album: Option<WireAlbum>,
    #[serde(default, alias = "dt")]
    duration: Option<u64>,
    #[serde(default)]
    fee: Option<i64>,
    #[serde(default)]
    no_copyright_rcmd: Option<Value>,
}

impl WireSong {
    fn cover_url(&self) -> Option<&str> {
        self.album
            .as_ref()
            .and_then(|a| a.pic_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Songs without a name or without artists are dropped
    fn into_track(self, platform: Platform) -> Option<Track> {
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        let artists: Vec<Artist> = self
            .artists
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| {
                let name = a.name.filter(|n| !n.is_empty())?;
                Some(Artist::new(value_id(a.id), name))
            })
            .collect();
        if artists.is_empty() {
            return None;
        }

        let album = self
            .album
            .map(|a| Album {
                id: value_id(a.id).unwrap_or_default(),
                name: a.name.unwrap_or_default(),
                cover_url: a.pic_url.filter(|url| !url.is_empty()),
            })
            .unwrap_or_default();

        Some(Track {
            id: self.id,
            name,
            artists,
            album,
            duration_ms: self.duration.unwrap_or(0),
            platform,
            playability: Playability {
                subscription_only: self.fee.is_some_and(|fee| SUBSCRIPTION_FEES.contains(&fee)),
                restricted: self.no_copyright_rcmd.is_some(),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    songs: Option<Vec<WireSong>>,
    #[serde(default)]
    song_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SongsEnvelope {
    #[serde(default)]
    songs: Option<Vec<WireSong>>,
}

#[derive(Debug, Deserialize)]
struct UrlData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UrlEnvelope {
    #[serde(default)]
    data: Option<Vec<UrlData>>,
}

#[derive(Debug, Deserialize)]
struct NewSongItem {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    song: WireSong,
}

#[derive(Debug, Deserialize)]
struct NewSongEnvelope {
    #[serde(default)]
    result: Option<Vec<NewSongItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCreator {
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePlaylist {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    cover_img_url: Option<String>,
    #[serde(default)]
    track_count: Option<u64>,
    #[serde(default)]
    play_count: Option<u64>,
    #[serde(default)]
    creator: Option<WireCreator>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl WirePlaylist {
    fn into_playlist(self, platform: Platform) -> Playlist {
        let creator = self
            .creator
            .map(|c| Creator {
                id: value_id(c.user_id).unwrap_or_default(),
                name: c.nickname.unwrap_or_default(),
                avatar_url: c.avatar_url,
            })
            .unwrap_or_default();

        Playlist {
            id: self.id,
            name: self.name.unwrap_or_default(),
            description: self.description,
            cover_url: self.cover_img_url,
            track_count: self.track_count.unwrap_or(0),
            play_count: self.play_count.unwrap_or(0),
            creator,
            tags: self.tags.unwrap_or_default(),
            platform,
            tracks: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TopPlaylistEnvelope {
    #[serde(default)]
    playlists: Option<Vec<WirePlaylist>>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    more: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PlaylistDetailEnvelope {
    #[serde(default)]
    playlist: Option<WirePlaylist>,
}

#[derive(Debug, Deserialize)]
struct WireCategory {
    name: String,
    #[serde(default)]
    category: Option<i64>,
    #[serde(default)]
    hot: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CatlistEnvelope {
    #[serde(default)]
    sub: Option<Vec<WireCategory>>,
    #[serde(default)]
    categories: Option<HashMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(json: &str) -> WireSong {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_search_shape() {
        let track = song(
            r#"{"id": 186016, "name": "晴天", "artists": [{"id": 6452, "name": "周杰伦"}],
                "album": {"id": 18903, "name": "叶惠美", "picUrl": null},
                "duration": 269000, "fee": 8}"#,
        )
        .into_track(Platform::Netease)
        .unwrap();

        assert_eq!(track.id, "186016");
        assert_eq!(track.artists[0].id.as_deref(), Some("6452"));
        assert_eq!(track.album.cover_url, None);
        assert_eq!(track.duration_ms, 269000);
        assert!(track.playability.is_free());
    }

    #[test]
    fn test_detail_shape_and_playability() {
        let track = song(
            r#"{"id": 1, "name": "x", "ar": [{"id": 2, "name": "a"}],
                "al": {"id": 3, "name": "b", "picUrl": "http://img/p.jpg"},
                "dt": 1000, "fee": 1, "noCopyrightRcmd": {"type": 0}}"#,
        )
        .into_track(Platform::Netease)
        .unwrap();

        assert_eq!(track.album.cover_url.as_deref(), Some("http://img/p.jpg"));
        assert!(track.playability.subscription_only);
        assert!(track.playability.restricted);
    }

    #[test]
    fn test_incomplete_songs_dropped() {
        assert!(song(r#"{"id": 1, "name": "", "artists": [{"name": "a"}]}"#)
            .into_track(Platform::Netease)
            .is_none());
        assert!(song(r#"{"id": 1, "name": "x", "artists": []}"#)
            .into_track(Platform::Netease)
            .is_none());
        assert!(song(r#"{"id": 1, "name": "x"}"#)
            .into_track(Platform::Netease)
            .is_none());
    }

    #[test]
    fn test_null_copyright_is_not_restricted() {
        let track = song(r#"{"id": 1, "name": "x", "ar": [{"name": "a"}], "noCopyrightRcmd": null}"#)
            .into_track(Platform::Netease)
            .unwrap();
        assert!(!track.playability.restricted);
    }
}
