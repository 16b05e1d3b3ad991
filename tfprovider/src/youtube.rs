//! Client for the YouTube Music proxy API
//!
//! The proxy answers loosely shaped JSON: most fields have one or two
//! alternative names and artists may be objects or bare strings. The same
//! client also serves endpoints configured with the `kugou` platform tag.

use crate::http::HttpApi;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tfsource::{
    Album, Artist, MusicProvider, Playability, Platform, ProviderError, Result, Track,
};
use tracing::debug;

/// Results requested per search
pub const SEARCH_LIMIT: usize = 100;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

#[derive(Debug)]
pub struct YouTubeProvider {
    id: String,
    platform: Platform,
    api: HttpApi,
}

impl YouTubeProvider {
    pub(crate) fn new(id: String, platform: Platform, api: HttpApi) -> Self {
        Self { id, platform, api }
    }
}

#[async_trait]
impl MusicProvider for YouTubeProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn base_url(&self) -> &str {
        self.api.base_url()
    }

    async fn search(&self, keywords: &str) -> Result<Vec<Track>> {
        let params = [
            ("keywords", keywords.to_string()),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        let envelope: SearchEnvelope = self.api.get("/search/youtube", &params).await?;

        let items = envelope.result.and_then(|r| r.songs).unwrap_or_default();
        debug!(provider = %self.id, count = items.len(), "search {:?}", keywords);

        let mut seen = HashSet::new();
        Ok(items
            .into_iter()
            .filter_map(WireVideo::decode)
            .filter_map(|v| v.into_track(self.platform))
            .filter(|t| seen.insert(t.id.clone()))
            .collect())
    }

    async fn resolve_url(&self, track_id: &str) -> Result<String> {
        let params = [("id", track_id.to_string())];
        let envelope: UrlEnvelope = self.api.get("/song/url/youtube", &params).await?;

        envelope
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::NotFound(format!("no playable url for {}", track_id)))
    }

    async fn fetch_detail(&self, track_id: &str) -> Result<Track> {
        let params = [("id", track_id.to_string())];
        let video: WireVideo = self.api.get("/song/detail/youtube", &params).await?;

        video
            .into_track(self.platform)
            .ok_or_else(|| ProviderError::NotFound(format!("track {}", track_id)))
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireArtistRef {
    Named { name: Option<String> },
    Plain(String),
    Other(Value),
}

impl WireArtistRef {
    fn into_name(self) -> Option<String> {
        match self {
            WireArtistRef::Named { name } => name,
            WireArtistRef::Plain(name) => Some(name),
            WireArtistRef::Other(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireVideo {
    video_id: Option<Value>,
    id: Option<Value>,
    title: Option<String>,
    name: Option<String>,
    artists: Option<Vec<WireArtistRef>>,
    artist: Option<String>,
    album_id: Option<Value>,
    album: Option<Value>,
    thumbnail: Option<String>,
    image_url: Option<String>,
    duration: Option<Value>,
}

fn text_of(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Durations come in seconds, sometimes as a numeric string
fn duration_ms(value: Option<Value>) -> u64 {
    let seconds = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    seconds
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(|s| (s * 1000.0).round() as u64)
        .unwrap_or(0)
}

impl WireVideo {
    /// Items are decoded one by one so a malformed entry only drops itself
    fn decode(item: Value) -> Option<Self> {
        match serde_json::from_value(item) {
            Ok(video) => Some(video),
            Err(e) => {
                debug!("skipping undecodable item: {}", e);
                None
            }
        }
    }

    fn into_track(self, platform: Platform) -> Option<Track> {
        let id = text_of(self.video_id).or_else(|| text_of(self.id))?;
        let name = self
            .title
            .or(self.name)
            .filter(|n| !n.trim().is_empty())?;

        let mut artists: Vec<Artist> = self
            .artists
            .unwrap_or_default()
            .into_iter()
            .filter_map(WireArtistRef::into_name)
            .filter(|n| !n.is_empty())
            .map(Artist::named)
            .collect();
        if artists.is_empty() {
            let fallback = self.artist.filter(|a| !a.is_empty());
            artists.push(Artist::named(fallback.as_deref().unwrap_or(UNKNOWN_ARTIST)));
        }

        Some(Track {
            id,
            name,
            artists,
            album: Album {
                id: text_of(self.album_id).unwrap_or_default(),
                name: text_of(self.album).unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
                cover_url: self.thumbnail.or(self.image_url).filter(|u| !u.is_empty()),
            },
            duration_ms: duration_ms(self.duration),
            platform,
            playability: Playability::default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    songs: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct UrlEnvelope {
    #[serde(default)]
    url: Option<String>,
}
