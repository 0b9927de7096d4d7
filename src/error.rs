//! Error types for the listener library.
//!
//! Each external collaborator gets its own error enum; only the binaries
//! decide which of them end the run.

use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the station page or the metadata endpoint.
#[derive(Debug, Error)]
pub enum StationError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("failed to decode metadata from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Failures obtaining or refreshing a Spotify access token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no cached token and interactive authorization is unavailable")]
    NoToken,

    #[error("authorization was denied: {0}")]
    Denied(String),

    #[error("redirect URL has no authorization code: {0}")]
    MissingCode(String),

    #[error("token endpoint returned {status}: {message}")]
    TokenEndpoint { status: u16, message: String },

    #[error("token request failed: {0}")]
    Transport(#[from] Box<ureq::Error>),

    #[error("failed to parse token response: {0}")]
    Parse(String),

    #[error("token cache {path:?}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read authorization response: {0}")]
    Prompt(#[source] std::io::Error),
}

/// Failures from the catalog/playlist service.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{operation} failed with status {status}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("failed to parse {operation} response: {reason}")]
    Parse {
        operation: &'static str,
        reason: String,
    },
}

impl CatalogError {
    /// Auth failures mean there is no usable token; everything else is
    /// worth another attempt on the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::Auth(_))
    }
}

/// Failures loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_auth_errors_are_fatal() {
        assert!(CatalogError::Auth(AuthError::NoToken).is_fatal());
        let api = CatalogError::Api {
            operation: "search",
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert!(!api.is_fatal());
        assert_eq!(api.to_string(), "search failed with status 502: bad gateway");
    }
}
