//! Station metadata resolver.
//!
//! Derives the vendor stream id from the station's public page and polls
//! the now-playing endpoint for that stream. The page scraping is brittle
//! by nature, so it sits behind `EndpointResolver` and the matching core
//! only ever sees a `StationEndpoint`.

use std::time::Duration;

use tracing::debug;

use crate::error::StationError;
use crate::http;
use crate::models::{NowPlaying, StationEndpoint};

const ID_MARKER: &str = "@id";
const TYPE_MARKER: &str = "@type";
/// Index of the stream id within the `/`-split `@id` value.
const STREAM_ID_SEGMENT: usize = 2;

// ============================================================================
// Interfaces
// ============================================================================

/// Turns a station page URL into a stream endpoint.
pub trait EndpointResolver {
    /// `Ok(None)` when the page was fetched but no stream id could be derived.
    fn resolve(&self, station_url: &str) -> Result<Option<StationEndpoint>, StationError>;
}

/// Result of one now-playing poll that reached the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetaResponse {
    /// HTTP 200 with a usable body.
    Playing(NowPlaying),
    /// HTTP 204: the station is airing an ad or other non-music segment.
    Interstitial,
    /// Any other status.
    Unexpected(u16),
}

pub trait NowPlayingSource {
    fn fetch_now_playing(&self, endpoint: &StationEndpoint) -> Result<MetaResponse, StationError>;
}

// ============================================================================
// Parsing
// ============================================================================

/// Extract the stream id from a raw station page.
///
/// Looks for the first `@id` marker and the first `@type` after it, takes
/// the quoted value in between and returns its third `/`-separated
/// segment. e.g. `"@id":"/live/1469/","@type"` → `1469`.
pub fn extract_stream_id(page: &str) -> Option<String> {
    let start = page.find(ID_MARKER)?;
    let end = start + page[start..].find(TYPE_MARKER)?;
    let field = &page[start..end];

    let value = field.split('"').nth(2)?;
    let segment = value.split('/').nth(STREAM_ID_SEGMENT)?.trim();
    if segment.is_empty() {
        return None;
    }
    Some(segment.to_string())
}

/// Interpret a metadata endpoint response.
pub fn interpret_meta_response(
    url: &str,
    status: u16,
    body: &str,
) -> Result<MetaResponse, StationError> {
    match status {
        200 => serde_json::from_str::<NowPlaying>(body)
            .map(MetaResponse::Playing)
            .map_err(|e| StationError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        204 => Ok(MetaResponse::Interstitial),
        other => Ok(MetaResponse::Unexpected(other)),
    }
}

// ============================================================================
// iHeart Client
// ============================================================================

/// Blocking HTTP client for iHeart station pages and live metadata.
pub struct IHeartClient {
    agent: ureq::Agent,
    metadata_url_template: String,
}

impl IHeartClient {
    pub fn new(metadata_url_template: impl Into<String>) -> Self {
        Self {
            agent: http::agent(http::DEFAULT_TIMEOUT),
            metadata_url_template: metadata_url_template.into(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = http::agent(timeout);
        self
    }

    fn get(&self, url: &str) -> Result<(u16, String), StationError> {
        let transport = |source: ureq::Error| StationError::Transport {
            url: url.to_string(),
            source: Box::new(source),
        };
        let mut resp = self.agent.get(url).call().map_err(transport)?;
        let status = resp.status().as_u16();
        let body = if status == 204 {
            String::new()
        } else {
            resp.body_mut().read_to_string().map_err(transport)?
        };
        Ok((status, body))
    }
}

impl EndpointResolver for IHeartClient {
    fn resolve(&self, station_url: &str) -> Result<Option<StationEndpoint>, StationError> {
        let (status, page) = self.get(station_url)?;
        debug!(url = %station_url, status, bytes = page.len(), "fetched station page");
        Ok(extract_stream_id(&page).map(StationEndpoint::new))
    }
}

impl NowPlayingSource for IHeartClient {
    fn fetch_now_playing(&self, endpoint: &StationEndpoint) -> Result<MetaResponse, StationError> {
        let url = endpoint.metadata_url(&self.metadata_url_template);
        let (status, body) = self.get(&url)?;
        debug!(url = %url, status, "polled now-playing metadata");
        interpret_meta_response(&url, status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockResponse, MockServer};

    const URL: &str = "https://us.api.iheart.com/api/v3/live-meta/stream/1469/currentTrackMeta";

    #[test]
    fn test_extract_stream_id_from_json_ld() {
        let page = r#"<script type="application/ld+json">{"@context":"http://schema.org","@id":"/live/1469/","@type":"RadioStation","name":"Z100"}</script>"#;
        assert_eq!(extract_stream_id(page), Some("1469".to_string()));
    }

    #[test]
    fn test_extract_stream_id_uses_type_after_id() {
        // An earlier @type must not cut the field short.
        let page = r#"{"@type":"WebPage","@id":"/live/5361/","@type":"RadioStation"}"#;
        assert_eq!(extract_stream_id(page), Some("5361".to_string()));
    }

    #[test]
    fn test_missing_markers_is_absence() {
        assert_eq!(extract_stream_id("<html><body>No station here</body></html>"), None);
        assert_eq!(extract_stream_id(r#"{"@id":"/live/1469/"}"#), None);
        assert_eq!(extract_stream_id(r#"{"@type":"RadioStation"}"#), None);
        assert_eq!(extract_stream_id(""), None);
    }

    #[test]
    fn test_too_few_segments_is_absence() {
        assert_eq!(extract_stream_id(r#"{"@id":"live","@type":"RadioStation"}"#), None);
        assert_eq!(extract_stream_id(r#"{"@id":"/live","@type":"RadioStation"}"#), None);
        assert_eq!(extract_stream_id(r#"{"@id":"/live//","@type":"RadioStation"}"#), None);
    }

    #[test]
    fn test_unquoted_field_is_absence() {
        assert_eq!(extract_stream_id("@id = none @type"), None);
    }

    #[test]
    fn test_interpret_playing() {
        let body = r#"{"title":"Blinding Lights","artist":"The Weeknd","album":"After Hours"}"#;
        assert_eq!(
            interpret_meta_response(URL, 200, body).unwrap(),
            MetaResponse::Playing(NowPlaying {
                title: "Blinding Lights".to_string(),
                artist: "The Weeknd".to_string(),
            })
        );
    }

    #[test]
    fn test_interpret_interstitial() {
        assert_eq!(interpret_meta_response(URL, 204, "").unwrap(), MetaResponse::Interstitial);
    }

    #[test]
    fn test_interpret_unexpected_status() {
        assert_eq!(
            interpret_meta_response(URL, 503, "Service Unavailable").unwrap(),
            MetaResponse::Unexpected(503)
        );
    }

    fn client(server: &MockServer) -> IHeartClient {
        IHeartClient::new(format!("{}/meta/{{stream_id}}/current", server.url()))
    }

    #[test]
    fn test_client_resolves_station_page() {
        let server = MockServer::bind();
        let station_url = format!("{}/live/z100-1469/", server.url());
        let client = client(&server);
        let page = r#"<html><script>{"@id":"/live/1469/","@type":"RadioStation"}</script></html>"#;
        let served = server.serve(vec![MockResponse::json(200, page)]);

        let endpoint = client.resolve(&station_url).unwrap();
        assert_eq!(endpoint, Some(StationEndpoint::new("1469")));

        let requests = served.join().unwrap();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].target, "/live/z100-1469/");
        assert!(requests[0].header("user-agent").unwrap().starts_with("station-listener/"));
    }

    #[test]
    fn test_client_polls_metadata_statuses() {
        let server = MockServer::bind();
        let client = client(&server);
        let served = server.serve(vec![
            MockResponse::json(200, r#"{"title":"Blinding Lights","artist":"The Weeknd"}"#),
            MockResponse::empty(204),
            MockResponse::json(500, r#"{"error":"upstream"}"#),
        ]);
        let endpoint = StationEndpoint::new("1469");

        assert_eq!(
            client.fetch_now_playing(&endpoint).unwrap(),
            MetaResponse::Playing(NowPlaying {
                title: "Blinding Lights".to_string(),
                artist: "The Weeknd".to_string(),
            })
        );
        assert_eq!(client.fetch_now_playing(&endpoint).unwrap(), MetaResponse::Interstitial);
        assert_eq!(client.fetch_now_playing(&endpoint).unwrap(), MetaResponse::Unexpected(500));

        let requests = served.join().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.target == "/meta/1469/current"));
    }

    #[test]
    fn test_stalled_server_times_out() {
        // Accepts connections (kernel backlog) but never answers.
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let template = format!(
            "http://{}/meta/{{stream_id}}/current",
            silent.local_addr().unwrap()
        );
        let client = IHeartClient::new(template).with_timeout(Duration::from_millis(300));

        let started = std::time::Instant::now();
        let result = client.fetch_now_playing(&StationEndpoint::new("1469"));
        assert!(matches!(result, Err(StationError::Transport { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_interpret_malformed_body() {
        let err = interpret_meta_response(URL, 200, r#"{"title":"No artist"}"#).unwrap_err();
        assert!(matches!(err, StationError::Decode { .. }));
    }
}
