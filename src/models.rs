//! Core data models for the station listener.
//!
//! This module contains the records passed between the metadata resolver,
//! the matcher and the playlist synchronizer. Everything except
//! `StationEndpoint` and `PlaylistMirror` lives for a single poll tick.

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::normalize::{normalize_artist, normalize_track};

/// Placeholder substituted in the metadata URL template.
pub const STREAM_ID_PLACEHOLDER: &str = "{stream_id}";

// ============================================================================
// Station Models
// ============================================================================

/// Vendor stream identifier derived once per run from the station page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationEndpoint {
    stream_id: String,
}

impl StationEndpoint {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Render the now-playing URL for this stream from a template
    /// containing `{stream_id}`.
    pub fn metadata_url(&self, template: &str) -> String {
        template.replace(STREAM_ID_PLACEHOLDER, &self.stream_id)
    }
}

/// What the station reports as currently on air.
/// Extra fields in the metadata body are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
}

/// Search-friendly projection of a `NowPlaying` record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedQuery {
    pub track: String,
    pub artist: String,
}

impl NormalizedQuery {
    /// Titles drop stopwords, artist names keep them (and keep periods).
    pub fn from_now_playing(now: &NowPlaying) -> Self {
        Self {
            track: normalize_track(&now.title),
            artist: normalize_artist(&now.artist),
        }
    }
}

// ============================================================================
// Catalog Models
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

/// Best catalog candidate for a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogMatch {
    pub track_id: String,
    pub artists: Vec<ArtistRef>, // Credited order
    pub name: String,
    pub popularity: u8, // 0-100
}

impl CatalogMatch {
    /// Comma-joined credited artists, for log lines.
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

// ============================================================================
// Playlist Mirror
// ============================================================================

/// Local copy of the target playlist's track ids.
///
/// The server stays authoritative. Callers insert an id only after the
/// external add succeeded, so the mirror never holds an id the playlist
/// does not.
#[derive(Clone, Debug, Default)]
pub struct PlaylistMirror {
    ids: FxHashSet<String>,
}

impl PlaylistMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.ids.contains(track_id)
    }

    /// Returns false when the id was already present.
    pub fn insert(&mut self, track_id: impl Into<String>) -> bool {
        self.ids.insert(track_id.into())
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<String> for PlaylistMirror {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
