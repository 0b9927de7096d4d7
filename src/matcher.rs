//! Add/skip decision for a catalog match.
//!
//! The duplicate check runs before the popularity gate, so a low-popularity
//! song that is already in the playlist is reported as a duplicate and never
//! as low popularity.

use crate::models::{CatalogMatch, PlaylistMirror};

/// Minimum popularity accepted unless configured otherwise.
pub const DEFAULT_MIN_POPULARITY: u8 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    AlreadyInPlaylist,
    LowPopularity { popularity: u8 },
    Accept,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchPolicy {
    pub min_popularity: u8,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            min_popularity: DEFAULT_MIN_POPULARITY,
        }
    }
}

impl MatchPolicy {
    pub fn new(min_popularity: u8) -> Self {
        Self { min_popularity }
    }

    pub fn decide(&self, candidate: &CatalogMatch, mirror: &PlaylistMirror) -> Decision {
        if mirror.contains(&candidate.track_id) {
            Decision::AlreadyInPlaylist
        } else if candidate.popularity < self.min_popularity {
            Decision::LowPopularity {
                popularity: candidate.popularity,
            }
        } else {
            Decision::Accept
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtistRef;

    fn candidate(id: &str, popularity: u8) -> CatalogMatch {
        CatalogMatch {
            track_id: id.to_string(),
            artists: vec![ArtistRef {
                name: "The Weeknd".to_string(),
            }],
            name: "Blinding Lights".to_string(),
            popularity,
        }
    }

    #[test]
    fn test_duplicate_checked_before_popularity() {
        let mirror: PlaylistMirror = vec!["T1".to_string()].into_iter().collect();
        assert_eq!(
            MatchPolicy::default().decide(&candidate("T1", 10), &mirror),
            Decision::AlreadyInPlaylist
        );
    }

    #[test]
    fn test_popularity_boundary() {
        let mirror = PlaylistMirror::new();
        let policy = MatchPolicy::default();
        assert_eq!(policy.decide(&candidate("T1", 60), &mirror), Decision::Accept);
        assert_eq!(
            policy.decide(&candidate("T1", 59), &mirror),
            Decision::LowPopularity { popularity: 59 }
        );
    }

    #[test]
    fn test_custom_threshold() {
        let mirror = PlaylistMirror::new();
        assert_eq!(MatchPolicy::new(0).decide(&candidate("T1", 0), &mirror), Decision::Accept);
        assert_eq!(
            MatchPolicy::new(90).decide(&candidate("T1", 85), &mirror),
            Decision::LowPopularity { popularity: 85 }
        );
    }
}
