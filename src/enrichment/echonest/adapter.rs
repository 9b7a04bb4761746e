//! Adapter layer: Convert Echo Nest DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types, and
//! where the service's status codes are mapped onto [`EnrichmentError`].

use std::collections::BTreeMap;

use super::dto;
use crate::enrichment::domain::{
    AnalysisStatus, AudioSummary, EnrichmentError, RemoteTrack, Song,
};

/// Status code for "rate limit exceeded".
const CODE_RATE_LIMITED: i64 = 3;

/// Status code for "invalid parameter"; also used for unknown identifiers.
const CODE_INVALID_PARAMETER: i64 = 5;

/// Map a response status onto success or a classified error.
pub fn check_status(status: &dto::Status) -> Result<(), EnrichmentError> {
    match status.code {
        0 => Ok(()),
        CODE_RATE_LIMITED => Err(EnrichmentError::RateLimited),
        CODE_INVALID_PARAMETER if is_missing_identifier(&status.message) => {
            Err(EnrichmentError::NotFound(status.message.clone()))
        }
        code => Err(EnrichmentError::Api {
            code,
            message: status.message.clone(),
        }),
    }
}

fn is_missing_identifier(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("does not exist") || message.contains("not found")
}

/// Keep only the numeric entries of an audio summary.
pub fn to_summary(raw: Option<BTreeMap<String, serde_json::Value>>) -> AudioSummary {
    raw.unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| value.as_f64().map(|v| (name, v)))
        .collect()
}

pub fn to_song(song: dto::Song) -> Song {
    Song {
        id: song.id,
        artist_name: song.artist_name,
        title: song.title,
        audio_summary: to_summary(song.audio_summary),
        score: song.score,
    }
}

pub fn to_songs(response: dto::SongsResponse) -> Vec<Song> {
    response.songs.into_iter().map(to_song).collect()
}

pub fn to_remote_track(response: dto::TrackResponse) -> Result<RemoteTrack, EnrichmentError> {
    let track = response
        .track
        .ok_or_else(|| EnrichmentError::InvalidResponse("response has no track".to_string()))?;

    Ok(RemoteTrack {
        id: track.id,
        song_id: track.song_id.filter(|id| !id.is_empty()),
        status: track
            .status
            .as_deref()
            .map(AnalysisStatus::parse)
            .unwrap_or_default(),
        audio_summary: to_summary(track.audio_summary),
    })
}
