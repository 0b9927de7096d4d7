//! Configuration loading and parsing.
//!
//! The TOML file is read once at startup and merged with command-line
//! overrides into an immutable `Settings`, which is then handed to the
//! resolver, the Spotify client and the poll loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::matcher::DEFAULT_MIN_POPULARITY;
use crate::models::STREAM_ID_PLACEHOLDER;

pub const DEFAULT_METADATA_URL_TEMPLATE: &str =
    "https://us.api.iheart.com/api/v3/live-meta/stream/{stream_id}/currentTrackMeta";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 100;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PLAYLIST_LIMIT: i64 = 250;
pub const DEFAULT_REDIRECT_URI: &str = "https://www.google.com/";

/// Top-level configuration loaded from TOML.
#[derive(Debug, Deserialize)]
pub struct ListenerConfig {
    /// Station page used to derive the stream id.
    pub station_url: String,
    /// Target Spotify playlist id.
    pub playlist_id: String,
    /// Spotify application credentials.
    pub spotify: SpotifyCredentials,
    /// Where the OAuth token is cached (default: `.cache-{username}`).
    pub token_cache: Option<PathBuf>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_min_popularity")]
    pub min_popularity: u8,
    #[serde(default = "default_metadata_url_template")]
    pub metadata_url_template: String,
    /// Upper bound on any single HTTP call, connect through body.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_min_popularity() -> u8 {
    DEFAULT_MIN_POPULARITY
}

fn default_metadata_url_template() -> String {
    DEFAULT_METADATA_URL_TEMPLATE.to_string()
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

/// Values from the command line that take precedence over the file.
#[derive(Debug, Clone)]
pub struct Overrides {
    pub station_url: Option<String>,
    pub playlist_limit: i64,
}

impl Default for Overrides {
    fn default() -> Self {
        Self {
            station_url: None,
            playlist_limit: DEFAULT_PLAYLIST_LIMIT,
        }
    }
}

/// Resolved, validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub station_url: String,
    pub playlist_id: String,
    pub spotify: SpotifyCredentials,
    pub token_cache: PathBuf,
    pub poll_interval: Duration,
    pub min_popularity: u8,
    pub metadata_url_template: String,
    pub http_timeout: Duration,
    /// Size guard threshold; non-positive disables the guard.
    pub playlist_limit: i64,
}

impl ListenerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn into_settings(self, overrides: Overrides) -> Result<Settings, ConfigError> {
        let station_url = overrides.station_url.unwrap_or(self.station_url);

        require("station_url", &station_url)?;
        require("playlist_id", &self.playlist_id)?;
        require("spotify.client_id", &self.spotify.client_id)?;
        require("spotify.client_secret", &self.spotify.client_secret)?;
        require("spotify.username", &self.spotify.username)?;
        require("spotify.redirect_uri", &self.spotify.redirect_uri)?;

        if !self.metadata_url_template.contains(STREAM_ID_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "metadata_url_template must contain {}",
                STREAM_ID_PLACEHOLDER
            )));
        }
        if self.min_popularity > 100 {
            return Err(ConfigError::Invalid(format!(
                "min_popularity must be between 0 and 100, got {}",
                self.min_popularity
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http_timeout_secs must be positive".to_string(),
            ));
        }

        let token_cache = self
            .token_cache
            .unwrap_or_else(|| PathBuf::from(format!(".cache-{}", self.spotify.username)));

        Ok(Settings {
            station_url,
            playlist_id: self.playlist_id,
            spotify: self.spotify,
            token_cache,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            min_popularity: self.min_popularity,
            metadata_url_template: self.metadata_url_template,
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            playlist_limit: overrides.playlist_limit,
        })
    }
}

fn require(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
station_url = "https://www.iheart.com/live/kiss-108-1097/"
playlist_id = "37i9dQZF1DXcBWIGoYBM5M"

[spotify]
client_id = "client"
client_secret = "secret"
username = "listener"
"#;

    fn parse(raw: &str) -> ListenerConfig {
        ListenerConfig::parse(raw, Path::new("test.toml")).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let settings = parse(MINIMAL).into_settings(Overrides::default()).unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(100));
        assert_eq!(settings.http_timeout, Duration::from_secs(30));
        assert_eq!(settings.min_popularity, 60);
        assert_eq!(settings.playlist_limit, 250);
        assert_eq!(settings.metadata_url_template, DEFAULT_METADATA_URL_TEMPLATE);
        assert_eq!(settings.spotify.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(settings.token_cache, PathBuf::from(".cache-listener"));
    }

    #[test]
    fn test_cli_overrides_win() {
        let overrides = Overrides {
            station_url: Some("https://www.iheart.com/live/z100-1469/".to_string()),
            playlist_limit: 0,
        };
        let settings = parse(MINIMAL).into_settings(overrides).unwrap();
        assert_eq!(settings.station_url, "https://www.iheart.com/live/z100-1469/");
        assert_eq!(settings.playlist_limit, 0);
    }

    #[test]
    fn test_empty_required_field_rejected() {
        let raw = MINIMAL.replace("client_secret = \"secret\"", "client_secret = \"\"");
        let err = parse(&raw).into_settings(Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("spotify.client_secret"));
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let raw = format!("metadata_url_template = \"https://example.com/meta\"\n{}", MINIMAL);
        let err = parse(&raw).into_settings(Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("{stream_id}"));
    }

    #[test]
    fn test_popularity_out_of_range_rejected() {
        let raw = format!("min_popularity = 101\n{}", MINIMAL);
        assert!(parse(&raw).into_settings(Overrides::default()).is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let raw = format!("poll_interval_secs = 0\n{}", MINIMAL);
        assert!(parse(&raw).into_settings(Overrides::default()).is_err());
    }

    #[test]
    fn test_zero_http_timeout_rejected() {
        let raw = format!("http_timeout_secs = 0\n{}", MINIMAL);
        let err = parse(&raw).into_settings(Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("http_timeout_secs"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = ListenerConfig::load(file.path()).unwrap();
        assert_eq!(config.playlist_id, "37i9dQZF1DXcBWIGoYBM5M");
        assert_eq!(config.spotify.username, "listener");
    }

    #[test]
    fn test_missing_file_reported() {
        let err = ListenerConfig::load(Path::new("/nonexistent/station.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_file_reported() {
        let err = ListenerConfig::parse("station_url = ", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
