//! Echo Nest API Data Transfer Objects
//!
//! These types match what the v4 API returns.
//! DO NOT use these types outside the echonest module - convert to domain types.
//!
//! Every response is wrapped in a `response` object carrying a `status`:
//! ```json
//! {
//!   "response": {
//!     "status": {"version": "4.2", "code": 0, "message": "Success"},
//!     "songs": [{
//!       "id": "SOCZMFK12AC468668F",
//!       "artist_name": "Radiohead",
//!       "title": "Karma Police",
//!       "audio_summary": {"energy": 0.42, "tempo": 75.0, "duration": 264.1}
//!     }]
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outer wrapper of every response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub response: T,
}

/// Status block; `code` 0 means success
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Status {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub version: Option<String>,
}

/// Just the status, for checking a response before decoding its payload
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusOnly {
    pub status: Status,
}

/// `song/profile`, `song/search` and `song/identify` payload
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SongsResponse {
    pub status: Status,
    #[serde(default)]
    pub songs: Vec<Song>,
}

/// `track/profile` and `track/upload` payload
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackResponse {
    pub status: Status,
    pub track: Option<Track>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Song {
    pub id: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub title: String,
    /// Mixed numeric and string values (analysis_url, ...)
    pub audio_summary: Option<BTreeMap<String, serde_json::Value>>,
    /// Only present on `song/identify` results
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Track {
    pub id: String,
    /// "pending", "complete", "error" or "unavailable"
    pub status: Option<String>,
    pub song_id: Option<String>,
    pub audio_summary: Option<BTreeMap<String, serde_json::Value>>,
}

// ============================================================================
// CONTRACT TESTS
// ============================================================================

#[cfg(test)]
mod contract_tests {
    use super::*;

    #[test]
    fn test_parse_songs_response() {
        let json = r#"{"response": {
            "status": {"version": "4.2", "code": 0, "message": "Success"},
            "songs": [{
                "id": "SOCZMFK12AC468668F",
                "artist_name": "Radiohead",
                "title": "Karma Police",
                "audio_summary": {
                    "energy": 0.42,
                    "tempo": 75.0,
                    "duration": 264.1,
                    "analysis_url": "https://example.com/a.json"
                }
            }]
        }}"#;

        let envelope: Envelope<SongsResponse> =
            serde_json::from_str(json).expect("Should parse songs response");

        assert_eq!(envelope.response.status.code, 0);
        assert_eq!(envelope.response.songs.len(), 1);
        let song = &envelope.response.songs[0];
        assert_eq!(song.artist_name, "Radiohead");
        assert!(song.score.is_none());
        assert_eq!(song.audio_summary.as_ref().map(|s| s.len()), Some(4));
    }

    #[test]
    fn test_parse_error_status_without_payload() {
        let json = r#"{"response": {"status": {"version": "4.2", "code": 3, "message": "3|You are limited to 120 accesses every minute."}}}"#;

        let envelope: Envelope<StatusOnly> =
            serde_json::from_str(json).expect("Should parse status");
        assert_eq!(envelope.response.status.code, 3);

        let envelope: Envelope<SongsResponse> =
            serde_json::from_str(json).expect("Songs default to empty");
        assert!(envelope.response.songs.is_empty());
    }

    #[test]
    fn test_parse_track_response() {
        let json = r#"{"response": {
            "status": {"code": 0, "message": "Success"},
            "track": {
                "id": "TRXXHTJ1294CD8F3B3",
                "status": "complete",
                "song_id": "SOXZYYG127F3E1B7A2",
                "audio_summary": {"energy": 0.8, "key": 7}
            }
        }}"#;

        let envelope: Envelope<TrackResponse> =
            serde_json::from_str(json).expect("Should parse track response");
        let track = envelope.response.track.expect("track present");
        assert_eq!(track.status.as_deref(), Some("complete"));
        assert_eq!(track.song_id.as_deref(), Some("SOXZYYG127F3E1B7A2"));
    }

    #[test]
    fn test_parse_pending_track_without_summary() {
        let json = r#"{"response": {
            "status": {"code": 0, "message": "Success"},
            "track": {"id": "TRABC", "status": "pending"}
        }}"#;

        let envelope: Envelope<TrackResponse> = serde_json::from_str(json).unwrap();
        let track = envelope.response.track.unwrap();
        assert!(track.song_id.is_none());
        assert!(track.audio_summary.is_none());
    }
}
