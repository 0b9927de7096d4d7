//! Spotify OAuth2 authorization-code flow with a file-backed token cache.
//!
//! The poll loop only sees `TokenProvider::valid_token`. A cached token is
//! reused until it is about to expire and is then refreshed in place; the
//! interactive browser step only happens when no cache exists.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SpotifyCredentials;
use crate::error::AuthError;
use crate::http;

pub const SCOPE: &str = "user-library-read playlist-modify-public";
pub const ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Refresh this many seconds before the server-side expiry.
pub const EXPIRY_MARGIN_SECS: u64 = 60;

/// Capability handed to the catalog client: always returns a usable
/// bearer token or fails.
pub trait TokenProvider {
    fn valid_token(&mut self) -> Result<String, AuthError>;
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ============================================================================
// Token Cache
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds.
    pub expires_at: u64,
    pub scope: Option<String>,
}

impl CachedToken {
    pub fn is_expired(&self, now: u64) -> bool {
        now + EXPIRY_MARGIN_SECS >= self.expires_at
    }
}

/// Missing cache → `Ok(None)`. A corrupt cache is logged and ignored so
/// the caller falls back to authorizing again.
pub fn load_cached_token(path: &Path) -> Result<Option<CachedToken>, AuthError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(AuthError::Cache {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    match serde_json::from_str(&raw) {
        Ok(token) => Ok(Some(token)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable token cache");
            Ok(None)
        }
    }
}

pub fn save_cached_token(path: &Path, token: &CachedToken) -> Result<(), AuthError> {
    let json = serde_json::to_string_pretty(token).map_err(|e| AuthError::Parse(e.to_string()))?;
    std::fs::write(path, json).map_err(|source| AuthError::Cache {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Authorization Helpers
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    /// Refresh responses may omit the refresh token; keep the previous one.
    fn into_cached(self, now: u64, previous_refresh: Option<String>) -> CachedToken {
        CachedToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: now + self.expires_in,
            scope: self.scope,
        }
    }
}

/// URL the user opens to grant the playlist scopes.
pub fn authorize_url(credentials: &SpotifyCredentials) -> String {
    format!(
        "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}",
        ACCOUNTS_URL,
        urlencoding::encode(&credentials.client_id),
        urlencoding::encode(&credentials.redirect_uri),
        urlencoding::encode(SCOPE),
    )
}

/// Pull the `code` parameter out of the URL the browser was redirected to.
pub fn extract_code(redirect: &str) -> Result<String, AuthError> {
    let trimmed = redirect.trim();
    let parsed =
        url::Url::parse(trimmed).map_err(|_| AuthError::MissingCode(trimmed.to_string()))?;

    let mut code = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "error" => return Err(AuthError::Denied(value.into_owned())),
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            _ => {}
        }
    }
    code.ok_or_else(|| AuthError::MissingCode(trimmed.to_string()))
}

// ============================================================================
// OAuth Client
// ============================================================================

pub struct SpotifyOAuth {
    agent: ureq::Agent,
    credentials: SpotifyCredentials,
    cache_path: PathBuf,
    accounts_url: String,
    open_browser: bool,
    token: Option<CachedToken>,
}

impl SpotifyOAuth {
    /// Build the client and pick up any cached token.
    pub fn from_cache(
        credentials: SpotifyCredentials,
        cache_path: impl Into<PathBuf>,
    ) -> Result<Self, AuthError> {
        let cache_path = cache_path.into();
        let token = load_cached_token(&cache_path)?;
        if token.is_some() {
            debug!(path = %cache_path.display(), "loaded cached spotify token");
        }
        Ok(Self {
            agent: http::agent(http::DEFAULT_TIMEOUT),
            credentials,
            cache_path,
            accounts_url: ACCOUNTS_URL.to_string(),
            open_browser: true,
            token,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = http::agent(timeout);
        self
    }

    /// Point token requests at another accounts service base URL.
    pub fn with_accounts_url(mut self, accounts_url: impl Into<String>) -> Self {
        self.accounts_url = accounts_url.into();
        self
    }

    /// Disable launching a browser during `authorize_interactive`.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Print the authorize URL, try to open it, and read the redirect URL
    /// back from `input`.
    pub fn authorize_interactive<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), AuthError> {
        let url = authorize_url(&self.credentials);
        writeln!(
            output,
            "Copy/paste the following link into a browser if it does not auto-open:\n{}",
            url
        )
        .map_err(AuthError::Prompt)?;
        if self.open_browser {
            if let Err(e) = webbrowser::open(&url) {
                debug!(error = %e, "could not open browser");
            }
        }
        write!(output, "Enter the URL you were redirected to: ").map_err(AuthError::Prompt)?;
        output.flush().map_err(AuthError::Prompt)?;

        let mut line = String::new();
        input.read_line(&mut line).map_err(AuthError::Prompt)?;
        let code = extract_code(&line)?;
        self.exchange_code(&code)
    }

    pub fn exchange_code(&mut self, code: &str) -> Result<(), AuthError> {
        let response = self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ])?;
        let token = response.into_cached(now_unix(), None);
        save_cached_token(&self.cache_path, &token)?;
        info!("spotify authorization complete");
        self.token = Some(token);
        Ok(())
    }

    fn refresh(&mut self, refresh_token: String) -> Result<(), AuthError> {
        let response = self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ])?;
        let token = response.into_cached(now_unix(), Some(refresh_token));
        save_cached_token(&self.cache_path, &token)?;
        debug!(expires_at = token.expires_at, "refreshed spotify token");
        self.token = Some(token);
        Ok(())
    }

    fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let url = format!("{}/api/token", self.accounts_url);
        let credentials = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));

        let mut resp = self
            .agent
            .post(&url)
            .header("Authorization", format!("Basic {}", credentials))
            .send_form(form.iter().copied())
            .map_err(Box::new)?;
        let status = resp.status().as_u16();
        let body = resp.body_mut().read_to_string().map_err(Box::new)?;

        if !(200..300).contains(&status) {
            return Err(AuthError::TokenEndpoint {
                status,
                message: body,
            });
        }
        serde_json::from_str(&body).map_err(|e| AuthError::Parse(e.to_string()))
    }
}

impl TokenProvider for SpotifyOAuth {
    fn valid_token(&mut self) -> Result<String, AuthError> {
        let token = self.token.as_ref().ok_or(AuthError::NoToken)?;
        if !token.is_expired(now_unix()) {
            return Ok(token.access_token.clone());
        }
        let refresh_token = token.refresh_token.clone().ok_or(AuthError::NoToken)?;
        self.refresh(refresh_token)?;
        self.token
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(AuthError::NoToken)
    }
}
