//! Echo Nest HTTP client
//!
//! Handles communication with the v4 web API.
//!
//! ## Error mapping
//!
//! The service reports most failures inside the JSON body (`response.status`)
//! rather than through HTTP status codes, so both are inspected:
//! - HTTP 429 or status code 3 → [`EnrichmentError::RateLimited`]
//! - HTTP 408 / 5xx and transport failures → [`EnrichmentError::Network`]
//! - status code 5 naming a missing identifier, or a bare HTTP 404 →
//!   [`EnrichmentError::NotFound`]
//! - any other non-zero status code → [`EnrichmentError::Api`]
//!
//! ## Repeated parameters
//!
//! `id` and `bucket` may appear several times in one request; they are
//! passed as repeated query pairs.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::{adapter, dto};
use crate::enrichment::domain::{Bucket, EnrichmentError, RemoteTrack, Song, SongQuery};
use crate::enrichment::traits::EchoNestApi;

const ECHONEST_API_BASE: &str = "https://developer.echonest.com/api/v4";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Uploads send the whole file and wait for the service to accept it.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

type Params = Vec<(&'static str, String)>;

/// Echo Nest API client
#[derive(Debug, Clone)]
pub struct EchoNestClient {
    api_key: String,
    http_client: reqwest::Client,
    base_url: String,
}

impl EchoNestClient {
    /// Create a new client with the given API key
    pub fn new(api_key: impl Into<String>) -> Result<Self, EnrichmentError> {
        Self::with_base_url(api_key, ECHONEST_API_BASE)
    }

    /// Create a client against a custom base URL (mock servers, proxies)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| EnrichmentError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Parameters every request carries.
    fn params(&self, buckets: &[Bucket]) -> Params {
        let mut params = vec![
            ("api_key", self.api_key.clone()),
            ("format", "json".to_string()),
        ];
        params.extend(buckets.iter().map(|b| ("bucket", b.as_str().to_string())));
        params
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &Params,
    ) -> Result<T, EnrichmentError> {
        trace!("echonest: GET {}", endpoint);
        let request = self.http_client.get(self.url(endpoint)).query(params);
        self.send(endpoint, request).await
    }

    /// Send a request and decode the `response` payload.
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, EnrichmentError> {
        let response = request.send().await.map_err(from_reqwest)?;
        let status = response.status();
        debug!("echonest: {} -> {}", endpoint, status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EnrichmentError::RateLimited);
        }
        if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.text().await.map_err(from_reqwest)?;
        trace!("echonest: response body: {}", body);

        let head: dto::Envelope<dto::StatusOnly> = match serde_json::from_str(&body) {
            Ok(head) => head,
            Err(e) if status == StatusCode::NOT_FOUND => {
                return Err(EnrichmentError::NotFound(format!("{} ({})", endpoint, e)));
            }
            Err(_) if !status.is_success() => {
                return Err(EnrichmentError::Api {
                    code: i64::from(status.as_u16()),
                    message: body.chars().take(200).collect(),
                });
            }
            Err(e) => return Err(EnrichmentError::Parse(e.to_string())),
        };
        adapter::check_status(&head.response.status)?;

        serde_json::from_str::<dto::Envelope<T>>(&body)
            .map(|envelope| envelope.response)
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }
}

/// Classify a transport-level failure.
fn from_reqwest(e: reqwest::Error) -> EnrichmentError {
    if e.is_builder() {
        EnrichmentError::InvalidRequest(e.to_string())
    } else if e.is_decode() {
        EnrichmentError::Parse(e.to_string())
    } else {
        EnrichmentError::Network(e.to_string())
    }
}

#[async_trait]
impl EchoNestApi for EchoNestClient {
    async fn song_profile(
        &self,
        ids: &[String],
        buckets: &[Bucket],
    ) -> Result<Vec<Song>, EnrichmentError> {
        let mut params = self.params(buckets);
        params.extend(ids.iter().map(|id| ("id", id.clone())));
        let response: dto::SongsResponse = self.get("song/profile", &params).await?;
        Ok(adapter::to_songs(response))
    }

    async fn song_profile_by_track(
        &self,
        track_ids: &[String],
        buckets: &[Bucket],
    ) -> Result<Vec<Song>, EnrichmentError> {
        let mut params = self.params(buckets);
        params.extend(track_ids.iter().map(|id| ("track_id", id.clone())));
        let response: dto::SongsResponse = self.get("song/profile", &params).await?;
        Ok(adapter::to_songs(response))
    }

    async fn song_search(&self, query: &SongQuery) -> Result<Vec<Song>, EnrichmentError> {
        let mut params = self.params(&query.buckets);
        params.push(("title", query.title.clone()));
        params.push(("artist", query.artist.clone()));
        params.push(("results", query.results.to_string()));
        let response: dto::SongsResponse = self.get("song/search", &params).await?;
        Ok(adapter::to_songs(response))
    }

    async fn song_identify(
        &self,
        code: &str,
        buckets: &[Bucket],
    ) -> Result<Vec<Song>, EnrichmentError> {
        let mut params = self.params(buckets);
        params.push(("code", code.to_string()));
        let response: dto::SongsResponse = self.get("song/identify", &params).await?;
        Ok(adapter::to_songs(response))
    }

    async fn track_from_id(
        &self,
        identifier: &str,
        buckets: &[Bucket],
    ) -> Result<RemoteTrack, EnrichmentError> {
        let mut params = self.params(buckets);
        params.push(("id", identifier.to_string()));
        let response: dto::TrackResponse = self.get("track/profile", &params).await?;
        adapter::to_remote_track(response)
    }

    async fn track_from_file(
        &self,
        path: &Path,
        filetype: &str,
    ) -> Result<RemoteTrack, EnrichmentError> {
        let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                EnrichmentError::InvalidRequest(format!("{}: {}", path.display(), e))
            }
            _ => EnrichmentError::from(e),
        })?;

        let mut params = self.params(&[]);
        params.push(("filetype", filetype.to_string()));

        debug!(
            "echonest: uploading {} ({} bytes)",
            path.display(),
            data.len()
        );
        let request = self
            .http_client
            .post(self.url("track/upload"))
            .query(&params)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .timeout(UPLOAD_TIMEOUT)
            .body(data);

        let response: dto::TrackResponse = self.send("track/upload", request).await?;
        adapter::to_remote_track(response)
    }
}
