//! Playlist synchronizer: search, decide, and mutate the playlist and its
//! local mirror.

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::matcher::{Decision, MatchPolicy};
use crate::models::{CatalogMatch, NormalizedQuery, PlaylistMirror};

/// What one synchronization attempt did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    NoMatch,
    Skipped {
        candidate: CatalogMatch,
        decision: Decision,
    },
    Added {
        candidate: CatalogMatch,
    },
}

/// True when the playlist is over a positive size limit.
pub fn exceeds_limit(track_count: usize, limit: i64) -> bool {
    limit > 0 && i64::try_from(track_count).map_or(true, |count| count > limit)
}

pub struct Synchronizer<C: Catalog> {
    catalog: C,
    mirror: PlaylistMirror,
    policy: MatchPolicy,
    loaded_count: usize,
}

impl<C: Catalog> Synchronizer<C> {
    /// Load the current playlist contents into the mirror.
    pub fn load(mut catalog: C, policy: MatchPolicy) -> Result<Self, CatalogError> {
        let ids = catalog.playlist_track_ids()?;
        let loaded_count = ids.len();
        let mirror: PlaylistMirror = ids.into_iter().collect();
        info!(tracks = loaded_count, unique = mirror.len(), "loaded playlist");
        Ok(Self {
            catalog,
            mirror,
            policy,
            loaded_count,
        })
    }

    /// Startup housekeeping: clear the whole playlist when it holds more
    /// than `limit` tracks. Returns whether it was cleared.
    pub fn enforce_size_limit(&mut self, limit: i64) -> Result<bool, CatalogError> {
        if !exceeds_limit(self.loaded_count, limit) {
            return Ok(false);
        }
        self.catalog.clear_playlist()?;
        self.mirror.clear();
        self.loaded_count = 0;
        warn!(limit, "Playlist over {} songs! Clearing out and starting fresh", limit);
        Ok(true)
    }

    /// Search for the query and add the top match if the policy accepts it.
    /// The mirror is only updated after the playlist add succeeded.
    pub fn sync(&mut self, query: &NormalizedQuery) -> Result<SyncOutcome, CatalogError> {
        let Some(candidate) = self.catalog.search(query)? else {
            warn!(
                artist = %query.artist,
                track = %query.track,
                "FAILED SPOTIFY SEARCH = Artist:{} Track:{}",
                query.artist,
                query.track
            );
            return Ok(SyncOutcome::NoMatch);
        };

        info!(
            id = %candidate.track_id,
            "Spotify found \"{}\" - {}",
            candidate.name,
            candidate.artist_names()
        );

        let decision = self.policy.decide(&candidate, &self.mirror);
        match decision {
            Decision::AlreadyInPlaylist => {
                info!("Song is already in playlist");
            }
            Decision::LowPopularity { popularity } => {
                info!(popularity, "Low song popularity ({}) not added to playlist", popularity);
            }
            Decision::Accept => {
                self.catalog
                    .add_tracks(std::slice::from_ref(&candidate.track_id))?;
                self.mirror.insert(candidate.track_id.clone());
                info!(id = %candidate.track_id, "Song has been added to the playlist");
                return Ok(SyncOutcome::Added { candidate });
            }
        }
        Ok(SyncOutcome::Skipped {
            candidate,
            decision,
        })
    }

    pub fn mirror(&self) -> &PlaylistMirror {
        &self.mirror
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }
}
