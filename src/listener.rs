//! The poll loop.
//!
//! Each tick goes `Idle → Fetching → (Empty | Matching | TransientFailure)`
//! and back to `Idle`, then waits out the poll interval. A tick only
//! returns `Err` when there is no usable token; every other failure is
//! logged and the next tick tries again.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::models::{NormalizedQuery, StationEndpoint};
use crate::station::{MetaResponse, NowPlayingSource};
use crate::sync::{SyncOutcome, Synchronizer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Empty,
    Matching,
    TransientFailure,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// 204 from the metadata endpoint.
    Interstitial,
    UnexpectedStatus(u16),
    FetchFailed,
    Synced(SyncOutcome),
    /// Search or add failed; logged with the query context.
    MatchFailed,
}

impl TickOutcome {
    /// State the tick ended in before returning to `Idle`.
    pub fn state(&self) -> PollState {
        match self {
            TickOutcome::Interstitial => PollState::Empty,
            TickOutcome::Synced(_) | TickOutcome::MatchFailed => PollState::Matching,
            TickOutcome::UnexpectedStatus(_) | TickOutcome::FetchFailed => {
                PollState::TransientFailure
            }
        }
    }
}

/// Signal-handler side of shutdown. Returns false when an earlier request
/// is still pending, i.e. the loop has not reached its wait because a tick
/// is stuck; the caller should then exit the process directly.
pub fn request_shutdown(shutdown: &Sender<()>) -> bool {
    shutdown.try_send(()).is_ok()
}

pub struct Listener<S: NowPlayingSource, C: Catalog> {
    source: S,
    endpoint: StationEndpoint,
    sync: Synchronizer<C>,
    interval: Duration,
}

impl<S: NowPlayingSource, C: Catalog> Listener<S, C> {
    pub fn new(
        source: S,
        endpoint: StationEndpoint,
        sync: Synchronizer<C>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            endpoint,
            sync,
            interval,
        }
    }

    pub fn synchronizer(&self) -> &Synchronizer<C> {
        &self.sync
    }

    /// Run one poll tick to completion.
    pub fn tick(&mut self) -> Result<TickOutcome, CatalogError> {
        debug!(state = ?PollState::Fetching, stream = self.endpoint.stream_id(), "polling");

        let now = match self.source.fetch_now_playing(&self.endpoint) {
            Ok(MetaResponse::Playing(now)) => now,
            Ok(MetaResponse::Interstitial) => {
                info!("Radio station is currently playing an ad");
                return Ok(TickOutcome::Interstitial);
            }
            Ok(MetaResponse::Unexpected(status)) => {
                warn!(
                    status,
                    stream = self.endpoint.stream_id(),
                    "Unknown error code {} for stream {}",
                    status,
                    self.endpoint.stream_id()
                );
                return Ok(TickOutcome::UnexpectedStatus(status));
            }
            Err(e) => {
                warn!(error = %e, "metadata fetch failed");
                return Ok(TickOutcome::FetchFailed);
            }
        };

        info!("iHeartRadio is listening to \"{}\" - {}", now.title, now.artist);
        let query = NormalizedQuery::from_now_playing(&now);

        match self.sync.sync(&query) {
            Ok(outcome) => Ok(TickOutcome::Synced(outcome)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    artist = %query.artist,
                    track = %query.track,
                    error = %e,
                    "SPOTIFY SEARCH = artist:{} track:{}",
                    query.artist,
                    query.track
                );
                Ok(TickOutcome::MatchFailed)
            }
        }
    }

    /// Poll until `shutdown` fires (or its senders are gone) or a tick
    /// fails fatally.
    pub fn run(&mut self, shutdown: &Receiver<()>) -> Result<(), CatalogError> {
        info!(stream = self.endpoint.stream_id(), "Starting iHeart Radio listener");
        loop {
            let outcome = self.tick()?;
            debug!(state = ?outcome.state(), "tick finished");
            debug!(state = ?PollState::Idle, wait_secs = self.interval.as_secs(), "waiting");

            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("shutdown requested, stopping listener");
                    return Ok(());
                }
            }
        }
    }
}
