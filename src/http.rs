//! Shared HTTP agent setup for the station and Spotify clients.

use std::time::Duration;

use crate::config::DEFAULT_HTTP_TIMEOUT_SECS;

pub const USER_AGENT: &str = concat!("station-listener/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS);

/// Blocking agent that hands every status back to the caller and abandons
/// any single call after `timeout`.
pub fn agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .user_agent(USER_AGENT)
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(config)
}
