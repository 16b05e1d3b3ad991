//! Canonical data structures shared by every provider
//!
//! Provider clients translate their wire formats into these types; nothing
//! provider-specific is allowed past this boundary.

use crate::error::ProviderError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Flexible deserializer for ids that may be strings or integers
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::custom("ID must be a string or number")),
    }
}

/// Music platform owning a track or playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Netease,
    #[serde(rename = "youtube")]
    YouTube,
    Kugou,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Netease, Platform::YouTube, Platform::Kugou];

    /// Lowercase tag used in configuration and track keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Netease => "netease",
            Platform::YouTube => "youtube",
            Platform::Kugou => "kugou",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "netease" | "163" => Ok(Platform::Netease),
            "youtube" | "yt" => Ok(Platform::YouTube),
            "kugou" => Ok(Platform::Kugou),
            other => Err(ProviderError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Global identity of a track: the id is only unique within its platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackKey {
    pub platform: Platform,
    pub id: String,
}

impl TrackKey {
    pub fn new(platform: Platform, id: impl Into<String>) -> Self {
        Self {
            platform,
            id: id.into(),
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    /// Some platforms only give a display name
    pub id: Option<String>,
    pub name: String,
}

impl Artist {
    pub fn new(id: Option<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(None, name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub cover_url: Option<String>,
}

/// Restrictions reported by the provider for a track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playability {
    /// Only playable with a paid subscription
    pub subscription_only: bool,
    /// Region or copyright restricted
    pub restricted: bool,
}

impl Playability {
    pub fn is_free(&self) -> bool {
        !self.subscription_only && !self.restricted
    }
}

/// Canonical track record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<Artist>,
    pub album: Album,
    pub duration_ms: u64,
    pub platform: Platform,
    #[serde(default)]
    pub playability: Playability,
}

impl Track {
    pub fn key(&self) -> TrackKey {
        TrackKey::new(self.platform, self.id.clone())
    }

    /// Name of the first credited artist, empty when none
    pub fn first_artist(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }

    /// Artist names joined for display
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// Canonical playlist record; `tracks` is filled lazily
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub track_count: u64,
    pub play_count: u64,
    pub creator: Creator,
    pub tags: Vec<String>,
    pub platform: Platform,
    #[serde(default)]
    pub tracks: Option<Vec<Track>>,
}

/// Browsable playlist category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistCategory {
    pub name: String,
    pub group: Option<String>,
    pub hot: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistOrder {
    #[default]
    Hot,
    New,
}

impl PlaylistOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistOrder::Hot => "hot",
            PlaylistOrder::New => "new",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistFilter {
    /// `None` browses every category
    pub category: Option<String>,
    pub order: PlaylistOrder,
}

impl PlaylistFilter {
    pub fn category(name: impl Into<String>) -> Self {
        Self {
            category: Some(name.into()),
            order: PlaylistOrder::Hot,
        }
    }
}

/// Offset based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    pub const DEFAULT_LIMIT: usize = 50;

    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Zero-based page number of `limit` items
    pub fn number(index: usize, limit: usize) -> Self {
        Self::new(limit, index.saturating_mul(limit))
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistPage {
    pub playlists: Vec<Playlist>,
    pub total: Option<u64>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parsing() {
        assert_eq!("netease".parse::<Platform>().unwrap(), Platform::Netease);
        assert_eq!(" YouTube ".parse::<Platform>().unwrap(), Platform::YouTube);
        assert_eq!("163".parse::<Platform>().unwrap(), Platform::Netease);
        assert!(matches!(
            "spotify".parse::<Platform>(),
            Err(ProviderError::UnknownPlatform(p)) if p == "spotify"
        ));
    }

    #[test]
    fn test_track_key_display() {
        let key = TrackKey::new(Platform::YouTube, "dQw4w9WgXcQ");
        assert_eq!(key.to_string(), "youtube:dQw4w9WgXcQ");
    }

    #[test]
    fn test_same_id_on_two_platforms_are_distinct() {
        let a = TrackKey::new(Platform::Netease, "42");
        let b = TrackKey::new(Platform::Kugou, "42");
        assert_ne!(a, b);
    }

    #[test]
    fn test_deserialize_numeric_id() {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(deserialize_with = "deserialize_id")]
            id: String,
        }

        let w: Wire = serde_json::from_str(r#"{"id": 186016}"#).unwrap();
        assert_eq!(w.id, "186016");
        let w: Wire = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(w.id, "abc");
        assert!(serde_json::from_str::<Wire>(r#"{"id": null}"#).is_err());
    }

    #[test]
    fn test_page_number() {
        assert_eq!(Page::number(2, 30), Page::new(30, 60));
        assert_eq!(Page::number(usize::MAX, 30), Page::new(30, usize::MAX));
    }
}
