//! Internal domain models for song resolution and audio features.
//!
//! These types are OUR types - they don't change when the remote API changes.
//! All remote responses get converted into these types by the echonest adapter.

use std::collections::BTreeMap;

/// Numeric acoustic features keyed by name (energy, tempo, duration, ...).
pub type AudioSummary = BTreeMap<String, f64>;

/// A song record on the remote service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Song {
    /// Remote song ID
    pub id: String,
    /// Artist name as known remotely
    pub artist_name: String,
    /// Song title
    pub title: String,
    /// Feature values, including `duration` in seconds
    pub audio_summary: AudioSummary,
    /// Match confidence, only set for fingerprint identification
    pub score: Option<f64>,
}

impl Song {
    /// Duration in seconds from the audio summary.
    pub fn duration(&self) -> Option<f64> {
        self.audio_summary.get("duration").copied()
    }
}

/// Features of a freshly analyzed upload with no song identity yet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawFeatureSet {
    pub features: AudioSummary,
}

/// Outcome of resolving one local track.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionResult {
    Song(Song),
    RawFeatures(RawFeatureSet),
}

impl ResolutionResult {
    /// Feature values regardless of variant.
    pub fn features(&self) -> &AudioSummary {
        match self {
            Self::Song(song) => &song.audio_summary,
            Self::RawFeatures(raw) => &raw.features,
        }
    }

    /// Remote song ID, if the result has an identity.
    pub fn song_id(&self) -> Option<&str> {
        match self {
            Self::Song(song) => Some(&song.id),
            Self::RawFeatures(_) => None,
        }
    }
}

/// Analysis state of an uploaded or looked-up remote track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisStatus {
    Pending,
    Complete,
    Error,
    Unavailable,
    #[default]
    Unknown,
}

impl AnalysisStatus {
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "complete" => Self::Complete,
            "error" => Self::Error,
            "unavailable" => Self::Unavailable,
            _ => Self::Unknown,
        }
    }
}

/// A remote analysis record (one uploaded or catalogued recording).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteTrack {
    pub id: String,
    /// Song this track belongs to, once the service has matched it
    pub song_id: Option<String>,
    pub status: AnalysisStatus,
    pub audio_summary: AudioSummary,
}

/// Response sections ("buckets") that can be requested with a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    AudioSummary,
    MusicBrainzIds,
    Tracks,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AudioSummary => "audio_summary",
            Self::MusicBrainzIds => "id:musicbrainz",
            Self::Tracks => "tracks",
        }
    }
}

/// Text search parameters for `song/search`.
#[derive(Debug, Clone, PartialEq)]
pub struct SongQuery {
    pub title: String,
    pub artist: String,
    pub results: u32,
    pub buckets: Vec<Bucket>,
}

/// How a failure should be handled by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Quota exceeded; wait and try again
    RateLimited,
    /// The referenced identifier does not exist
    NotFound,
    /// Network or socket trouble; wait and try again
    TransientIo,
    /// Anything else; give up
    Fatal,
}

/// Errors that can occur while resolving and enriching tracks
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to generate fingerprint: {0}")]
    Fingerprint(String),

    #[error("Failed to convert audio: {0}")]
    Transcode(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("{operation}: exceeded {attempts} retries")]
    ExhaustedRetries { operation: String, attempts: u32 },
}

impl EnrichmentError {
    /// Retry classification of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RateLimited => ErrorClass::RateLimited,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::Network(_) | Self::Io(_) => ErrorClass::TransientIo,
            Self::Api { .. }
            | Self::Parse(_)
            | Self::InvalidResponse(_)
            | Self::InvalidRequest(_)
            | Self::Fingerprint(_)
            | Self::Transcode(_)
            | Self::Analysis(_)
            | Self::ExhaustedRetries { .. } => ErrorClass::Fatal,
        }
    }
}

impl From<std::io::Error> for EnrichmentError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
