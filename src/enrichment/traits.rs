//! Trait definitions for the remote service and local collaborators.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses the real implementations ([`EchoNestClient`],
//! [`EchoprintCodegen`], [`FfmpegTranscoder`], [`LibraryWriter`]), while tests
//! substitute the mocks below.
//!
//! [`EchoNestClient`]: super::echonest::EchoNestClient
//! [`EchoprintCodegen`]: super::fingerprint::EchoprintCodegen
//! [`FfmpegTranscoder`]: super::transcode::FfmpegTranscoder
//! [`LibraryWriter`]: super::apply::LibraryWriter

use std::path::Path;

use async_trait::async_trait;
use tempfile::TempPath;

use super::domain::{Bucket, EnrichmentError, RemoteTrack, Song, SongQuery};
use crate::model::Track;

/// Remote music-intelligence operations.
///
/// Every method returns a classified [`EnrichmentError`] on failure so the
/// retry loop can decide what to do.
#[async_trait]
pub trait EchoNestApi: Send + Sync {
    /// `song/profile` by song IDs.
    async fn song_profile(
        &self,
        ids: &[String],
        buckets: &[Bucket],
    ) -> Result<Vec<Song>, EnrichmentError>;

    /// `song/profile` by track IDs.
    async fn song_profile_by_track(
        &self,
        track_ids: &[String],
        buckets: &[Bucket],
    ) -> Result<Vec<Song>, EnrichmentError>;

    /// `song/search` by title and artist.
    async fn song_search(&self, query: &SongQuery) -> Result<Vec<Song>, EnrichmentError>;

    /// `song/identify` by fingerprint code. Songs carry a match score.
    async fn song_identify(
        &self,
        code: &str,
        buckets: &[Bucket],
    ) -> Result<Vec<Song>, EnrichmentError>;

    /// `track/profile` by track ID or foreign ID (`musicbrainz:track:<mbid>`).
    async fn track_from_id(
        &self,
        identifier: &str,
        buckets: &[Bucket],
    ) -> Result<RemoteTrack, EnrichmentError>;

    /// `track/upload` of an audio file for analysis.
    async fn track_from_file(
        &self,
        path: &Path,
        filetype: &str,
    ) -> Result<RemoteTrack, EnrichmentError>;
}

/// Fingerprint code generator (runs the codegen tool).
#[async_trait]
pub trait Codegen: Send + Sync {
    async fn codegen(&self, path: &Path) -> Result<String, EnrichmentError>;
}

/// Converts audio the remote service can't accept into a format it can.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `source` into a temporary file that is removed when dropped.
    async fn convert(&self, source: &Path) -> Result<TempPath, EnrichmentError>;
}

/// Persistence for enriched tracks.
#[async_trait]
pub trait TrackSink: Send + Sync {
    /// Serialize attributes into the track's own file.
    async fn write(&self, track: &Track) -> crate::error::Result<()>;

    /// Update the library record for the track.
    async fn store(&self, track: &Track) -> crate::error::Result<()>;
}
