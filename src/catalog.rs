//! Catalog and playlist access over the Spotify Web API.
//!
//! `Catalog` is the seam the synchronizer works against; `SpotifyCatalog`
//! is the production implementation. Tokens come from a `TokenProvider`
//! on every call, so expiry is handled lazily.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::auth::TokenProvider;
use crate::error::CatalogError;
use crate::http;
use crate::models::{ArtistRef, CatalogMatch, NormalizedQuery};

pub const API_URL: &str = "https://api.spotify.com/v1";

/// Spotify accepts at most 100 items per add request.
pub const ADD_BATCH_SIZE: usize = 100;
const PAGE_SIZE: usize = 100;

/// Operations the synchronizer needs from the streaming service.
pub trait Catalog {
    /// Ids of every track currently in the target playlist.
    fn playlist_track_ids(&mut self) -> Result<Vec<String>, CatalogError>;

    /// Remove every track from the target playlist.
    fn clear_playlist(&mut self) -> Result<(), CatalogError>;

    /// Top-ranked track for the query, if any.
    fn search(&mut self, query: &NormalizedQuery) -> Result<Option<CatalogMatch>, CatalogError>;

    /// Append tracks to the target playlist.
    fn add_tracks(&mut self, track_ids: &[String]) -> Result<(), CatalogError>;
}

// ============================================================================
// Wire Models
// ============================================================================

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<PlaylistTrack>,
}

#[derive(Debug, Deserialize)]
struct PlaylistTrack {
    id: Option<String>, // None for local files
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: SearchTracks,
}

#[derive(Debug, Deserialize)]
struct SearchTracks {
    items: Vec<SearchTrack>,
}

#[derive(Debug, Deserialize)]
struct SearchTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    #[serde(default)]
    popularity: u8,
}

impl SearchTrack {
    fn into_match(self) -> Option<CatalogMatch> {
        Some(CatalogMatch {
            track_id: self.id?,
            artists: self.artists,
            name: self.name,
            popularity: self.popularity.min(100),
        })
    }
}

// ============================================================================
// Request Helpers
// ============================================================================

/// Spotify field-filter search string.
pub fn search_query(query: &NormalizedQuery) -> String {
    format!("artist:{} track:{}", query.artist, query.track)
}

pub fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

fn ids_from_page(page: &PlaylistPage) -> impl Iterator<Item = String> + '_ {
    page.items
        .iter()
        .filter_map(|item| item.track.as_ref())
        .filter_map(|track| track.id.clone())
}

fn first_match(response: SearchResponse) -> Option<CatalogMatch> {
    response
        .tracks
        .items
        .into_iter()
        .find_map(SearchTrack::into_match)
}

fn parse_body<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T, CatalogError> {
    serde_json::from_str(body).map_err(|e| CatalogError::Parse {
        operation,
        reason: e.to_string(),
    })
}

// ============================================================================
// Spotify Client
// ============================================================================

pub struct SpotifyCatalog<T: TokenProvider> {
    agent: ureq::Agent,
    tokens: T,
    playlist_id: String,
    api_url: String,
}

impl<T: TokenProvider> SpotifyCatalog<T> {
    pub fn new(tokens: T, playlist_id: impl Into<String>) -> Self {
        Self {
            agent: http::agent(http::DEFAULT_TIMEOUT),
            tokens,
            playlist_id: playlist_id.into(),
            api_url: API_URL.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = http::agent(timeout);
        self
    }

    /// Point the client at another Web API base URL.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn playlist_tracks_url(&self) -> String {
        format!("{}/playlists/{}/tracks", self.api_url, self.playlist_id)
    }

    fn bearer(&mut self) -> Result<String, CatalogError> {
        Ok(format!("Bearer {}", self.tokens.valid_token()?))
    }

    /// Read the response, turning non-2xx statuses into `CatalogError::Api`.
    fn finish(
        operation: &'static str,
        result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> Result<String, CatalogError> {
        let transport = |source: ureq::Error| CatalogError::Transport {
            operation,
            source: Box::new(source),
        };
        let mut resp = result.map_err(transport)?;
        let status = resp.status().as_u16();
        let body = resp.body_mut().read_to_string().map_err(transport)?;
        if !(200..300).contains(&status) {
            return Err(CatalogError::Api {
                operation,
                status,
                message: body,
            });
        }
        Ok(body)
    }

    fn get(&mut self, operation: &'static str, url: &str) -> Result<String, CatalogError> {
        let bearer = self.bearer()?;
        Self::finish(
            operation,
            self.agent.get(url).header("Authorization", bearer).call(),
        )
    }
}

impl<T: TokenProvider> Catalog for SpotifyCatalog<T> {
    fn playlist_track_ids(&mut self) -> Result<Vec<String>, CatalogError> {
        let mut ids = Vec::new();
        let mut next = Some(format!(
            "{}?fields=items(track(id)),next&limit={}",
            self.playlist_tracks_url(),
            PAGE_SIZE
        ));
        while let Some(url) = next {
            let body = self.get("playlist tracks", &url)?;
            let page: PlaylistPage = parse_body("playlist tracks", &body)?;
            ids.extend(ids_from_page(&page));
            next = page.next;
        }
        debug!(playlist = %self.playlist_id, count = ids.len(), "loaded playlist tracks");
        Ok(ids)
    }

    fn clear_playlist(&mut self) -> Result<(), CatalogError> {
        let bearer = self.bearer()?;
        let url = self.playlist_tracks_url();
        Self::finish(
            "clear playlist",
            self.agent
                .put(&url)
                .header("Authorization", bearer)
                .send_json(json!({ "uris": [] })),
        )?;
        Ok(())
    }

    fn search(&mut self, query: &NormalizedQuery) -> Result<Option<CatalogMatch>, CatalogError> {
        let url = format!(
            "{}/search?q={}&type=track&limit=1",
            self.api_url,
            urlencoding::encode(&search_query(query))
        );
        let body = self.get("search", &url)?;
        let response: SearchResponse = parse_body("search", &body)?;
        Ok(first_match(response))
    }

    fn add_tracks(&mut self, track_ids: &[String]) -> Result<(), CatalogError> {
        let url = self.playlist_tracks_url();
        for chunk in track_ids.chunks(ADD_BATCH_SIZE) {
            let bearer = self.bearer()?;
            let uris: Vec<String> = chunk.iter().map(|id| track_uri(id)).collect();
            Self::finish(
                "add tracks",
                self.agent
                    .post(&url)
                    .header("Authorization", bearer)
                    .send_json(json!({ "uris": uris })),
            )?;
        }
        Ok(())
    }
}
