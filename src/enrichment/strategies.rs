//! Resolution strategies: ways of finding the remote song for a local track.
//!
//! Each strategy implements [`ResolutionStrategy`]. `lookup` may fail with an
//! [`EnrichmentError`]; `attempt` is the boundary that logs the failure and
//! turns it into "no result", so one strategy can never abort the chain.
//!
//! | strategy | needs                          | remote calls                          |
//! |----------|--------------------------------|---------------------------------------|
//! | Profile  | cached remote id or MBID       | track/profile, song/profile           |
//! | Search   | artist and title               | song/search                           |
//! | Identify | fingerprint (codegen)          | song/identify                         |
//! | Analyze  | the audio file                 | track/upload, track/profile, song/profile |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::domain::{
    AnalysisStatus, Bucket, EnrichmentError, RawFeatureSet, RemoteTrack, ResolutionResult, Song,
    SongQuery,
};
use super::fingerprint::FingerprintProvider;
use super::retry::RetryingClient;
use super::traits::{EchoNestApi, Transcoder};
use super::transcode::is_accepted_format;
use crate::model::Track;

/// Largest accepted gap between local and remote duration, in seconds.
pub const MAX_DURATION_DISTANCE: f64 = 1.0;

/// Candidates requested from a text search.
pub const SEARCH_RESULTS: u32 = 100;

/// Files larger than this are not uploaded for analysis.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Wait between status checks of a pending analysis.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Status checks before a pending analysis is abandoned.
pub const MAX_POLLS: u32 = 20;

const AUDIO_SUMMARY: &[Bucket] = &[Bucket::AudioSummary];

/// Pick the candidate closest in duration to the track.
///
/// Candidates without a usable duration are ignored (as is everything when
/// the track's own length is not a number); the first one wins on equal
/// distance. Returns `None` if even the closest is more than
/// [`MAX_DURATION_DISTANCE`] away.
pub fn duration_tie_break(track: &Track, candidates: &[Song]) -> Option<Song> {
    let mut best: Option<(&Song, f64)> = None;

    for candidate in candidates {
        let Some(duration) = candidate.duration() else {
            continue;
        };
        let distance = (track.length_seconds - duration).abs();
        if !distance.is_finite() {
            continue;
        }
        if best.is_none_or(|(_, min)| distance < min) {
            best = Some((candidate, distance));
        }
    }

    let (song, distance) = best?;
    if distance > MAX_DURATION_DISTANCE {
        debug!(
            "echonest: closest candidate is {:.2}s off: {}",
            distance,
            track.display_path()
        );
        return None;
    }
    info!("echonest: candidate distance {:.2}", distance);
    Some(song.clone())
}

/// The identification match with the highest score; the first wins on ties.
fn best_scored(songs: Vec<Song>) -> Option<Song> {
    let mut best: Option<Song> = None;
    for song in songs {
        let score = song.score.unwrap_or(f64::NEG_INFINITY);
        if best
            .as_ref()
            .is_none_or(|b| score > b.score.unwrap_or(f64::NEG_INFINITY))
        {
            best = Some(song);
        }
    }
    best
}

/// Remote operations run through the retry loop.
///
/// `Ok(None)` means the service reported the identifier as unknown.
#[derive(Clone)]
pub struct RetryingApi {
    api: Arc<dyn EchoNestApi>,
    retry: RetryingClient,
}

impl RetryingApi {
    pub fn new(api: Arc<dyn EchoNestApi>, retry: RetryingClient) -> Self {
        Self { api, retry }
    }

    async fn call<T, F, Fut>(&self, operation: &str, op: F) -> Result<Option<T>, EnrichmentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EnrichmentError>>,
    {
        self.retry.invoke(operation, op).await.into_result(operation)
    }

    pub async fn song_profile(&self, ids: &[String]) -> Result<Option<Vec<Song>>, EnrichmentError> {
        let api = &*self.api;
        self.call("song/profile", move || api.song_profile(ids, AUDIO_SUMMARY))
            .await
    }

    pub async fn song_profile_by_track(
        &self,
        track_ids: &[String],
    ) -> Result<Option<Vec<Song>>, EnrichmentError> {
        let api = &*self.api;
        self.call("song/profile", move || {
            api.song_profile_by_track(track_ids, AUDIO_SUMMARY)
        })
        .await
    }

    pub async fn song_search(
        &self,
        query: &SongQuery,
    ) -> Result<Option<Vec<Song>>, EnrichmentError> {
        let api = &*self.api;
        self.call("song/search", move || api.song_search(query)).await
    }

    pub async fn song_identify(&self, code: &str) -> Result<Option<Vec<Song>>, EnrichmentError> {
        let api = &*self.api;
        self.call("song/identify", move || api.song_identify(code, AUDIO_SUMMARY))
            .await
    }

    pub async fn track_from_id(
        &self,
        identifier: &str,
    ) -> Result<Option<RemoteTrack>, EnrichmentError> {
        let api = &*self.api;
        self.call("track/profile", move || {
            api.track_from_id(identifier, AUDIO_SUMMARY)
        })
        .await
    }

    pub async fn track_from_file(
        &self,
        path: &std::path::Path,
        filetype: &str,
    ) -> Result<Option<RemoteTrack>, EnrichmentError> {
        let api = &*self.api;
        self.call("track/upload", move || api.track_from_file(path, filetype))
            .await
    }
}

/// One way of resolving a track to a remote song or feature set.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &'static str;

    /// Try to resolve the track. `Ok(None)` means this strategy has no match.
    async fn lookup(&self, track: &mut Track) -> Result<Option<ResolutionResult>, EnrichmentError>;

    /// Like [`lookup`](Self::lookup), but failures are logged and become `None`.
    async fn attempt(&self, track: &mut Track) -> Option<ResolutionResult> {
        match self.lookup(track).await {
            Ok(Some(result)) => Some(result),
            Ok(None) => {
                debug!(
                    "echonest: {}: no match: {}",
                    self.name(),
                    track.display_path()
                );
                None
            }
            Err(e) => {
                error!(
                    "echonest: {} failed: {}: {}",
                    self.name(),
                    track.display_path(),
                    e
                );
                None
            }
        }
    }
}

/// Direct lookup by a known identifier.
pub struct ProfileStrategy {
    remote: RetryingApi,
}

impl ProfileStrategy {
    pub fn new(remote: RetryingApi) -> Self {
        Self { remote }
    }

    async fn by_remote_id(&self, id: &str) -> Result<Vec<Song>, EnrichmentError> {
        Ok(self
            .remote
            .song_profile(&[id.to_string()])
            .await?
            .unwrap_or_default())
    }

    async fn by_mbid(&self, mbid: &str) -> Result<Vec<Song>, EnrichmentError> {
        let foreign_id = format!("musicbrainz:track:{}", mbid);
        let Some(remote_track) = self.remote.track_from_id(&foreign_id).await? else {
            return Ok(Vec::new());
        };

        let songs = match remote_track.song_id {
            Some(song_id) => self.remote.song_profile(&[song_id]).await?,
            None => self.remote.song_profile_by_track(&[remote_track.id]).await?,
        };
        Ok(songs.unwrap_or_default())
    }
}

#[async_trait]
impl ResolutionStrategy for ProfileStrategy {
    fn name(&self) -> &'static str {
        "profile"
    }

    async fn lookup(&self, track: &mut Track) -> Result<Option<ResolutionResult>, EnrichmentError> {
        let mut songs = Vec::new();
        let mut failure = None;

        if let Some(id) = track.remote_id.as_deref().filter(|id| !id.is_empty()) {
            match self.by_remote_id(id).await {
                Ok(found) => songs = found,
                Err(e) => {
                    warn!("echonest: profile: lookup of {} failed: {}", id, e);
                    failure = Some(e);
                }
            }
        }
        if songs.is_empty() {
            if let Some(mbid) = track.mb_trackid.as_deref().filter(|id| !id.is_empty()) {
                songs = self.by_mbid(mbid).await?;
            } else if let Some(e) = failure {
                return Err(e);
            } else if track.remote_id.is_none() {
                debug!(
                    "echonest: profile: no identifier available: {}",
                    track.display_path()
                );
                return Ok(None);
            }
        }

        let song = if songs.len() > 1 {
            duration_tie_break(track, &songs)
        } else {
            songs.into_iter().next()
        };
        Ok(song.map(ResolutionResult::Song))
    }
}

/// Text search on artist and title.
pub struct SearchStrategy {
    remote: RetryingApi,
}

impl SearchStrategy {
    pub fn new(remote: RetryingApi) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl ResolutionStrategy for SearchStrategy {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn lookup(&self, track: &mut Track) -> Result<Option<ResolutionResult>, EnrichmentError> {
        if track.artist.trim().is_empty() || track.title.trim().is_empty() {
            return Ok(None);
        }

        let query = SongQuery {
            title: track.title.clone(),
            artist: track.artist.clone(),
            results: SEARCH_RESULTS,
            buckets: AUDIO_SUMMARY.to_vec(),
        };
        let songs = self.remote.song_search(&query).await?.unwrap_or_default();

        let artist = track.artist.to_lowercase();
        let title = track.title.to_lowercase();
        let matching: Vec<Song> = songs
            .into_iter()
            .filter(|s| s.artist_name.to_lowercase() == artist && s.title.to_lowercase() == title)
            .collect();

        Ok(duration_tie_break(track, &matching).map(ResolutionResult::Song))
    }
}

/// Identification by audio fingerprint.
pub struct IdentifyStrategy {
    remote: RetryingApi,
    fingerprints: FingerprintProvider,
}

impl IdentifyStrategy {
    pub fn new(remote: RetryingApi, fingerprints: FingerprintProvider) -> Self {
        Self {
            remote,
            fingerprints,
        }
    }
}

#[async_trait]
impl ResolutionStrategy for IdentifyStrategy {
    fn name(&self) -> &'static str {
        "identify"
    }

    async fn lookup(&self, track: &mut Track) -> Result<Option<ResolutionResult>, EnrichmentError> {
        let Some(code) = self.fingerprints.fingerprint(track).await else {
            return Ok(None);
        };

        let songs = self.remote.song_identify(&code).await?.unwrap_or_default();
        Ok(best_scored(songs).map(ResolutionResult::Song))
    }
}

/// Settings for uploading audio for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzeOptions {
    /// Upload at all
    pub upload: bool,
    /// Convert formats the service doesn't accept
    pub convert: bool,
    pub max_upload_bytes: u64,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            upload: true,
            convert: true,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
        }
    }
}

/// Upload of the audio itself for a fresh analysis.
pub struct AnalyzeStrategy {
    remote: RetryingApi,
    transcoder: Arc<dyn Transcoder>,
    options: AnalyzeOptions,
}

impl AnalyzeStrategy {
    pub fn new(remote: RetryingApi, transcoder: Arc<dyn Transcoder>, options: AnalyzeOptions) -> Self {
        Self {
            remote,
            transcoder,
            options,
        }
    }

    /// Poll a pending analysis until it settles or the poll budget is spent.
    async fn wait_for_analysis(
        &self,
        mut remote_track: RemoteTrack,
    ) -> Result<Option<RemoteTrack>, EnrichmentError> {
        let mut polls = 0;
        while remote_track.status == AnalysisStatus::Pending && polls < self.options.max_polls {
            tokio::time::sleep(self.options.poll_interval).await;
            polls += 1;
            debug!(
                "echonest: analysis of {} pending ({}/{})",
                remote_track.id, polls, self.options.max_polls
            );
            match self.remote.track_from_id(&remote_track.id).await? {
                Some(updated) => remote_track = updated,
                None => return Ok(None),
            }
        }
        Ok(Some(remote_track))
    }
}

#[async_trait]
impl ResolutionStrategy for AnalyzeStrategy {
    fn name(&self) -> &'static str {
        "analyze"
    }

    async fn lookup(&self, track: &mut Track) -> Result<Option<ResolutionResult>, EnrichmentError> {
        if !self.options.upload {
            debug!("echonest: analyze: upload disabled");
            return Ok(None);
        }

        // Holds the converted file until the upload finishes.
        let mut converted = None;
        let (source, filetype) = if is_accepted_format(&track.format) {
            (track.path.clone(), track.format.to_lowercase())
        } else if self.options.convert {
            let temp = self.transcoder.convert(&track.path).await?;
            let path = temp.to_path_buf();
            converted = Some(temp);
            (path, "mp3".to_string())
        } else {
            debug!(
                "echonest: analyze: {} needs conversion, which is disabled",
                track.display_path()
            );
            return Ok(None);
        };

        let size = tokio::fs::metadata(&source).await?.len();
        if size > self.options.max_upload_bytes {
            warn!(
                "echonest: analyze: {} is too large to upload ({} bytes)",
                track.display_path(),
                size
            );
            return Ok(None);
        }

        info!("echonest: uploading {} for analysis", track.display_path());
        let uploaded = self.remote.track_from_file(&source, &filetype).await?;
        drop(converted);
        let Some(uploaded) = uploaded else {
            return Ok(None);
        };

        let Some(analysis) = self.wait_for_analysis(uploaded).await? else {
            return Ok(None);
        };
        match analysis.status {
            AnalysisStatus::Pending => {
                return Err(EnrichmentError::Analysis(format!(
                    "{} still pending after {} polls",
                    analysis.id, self.options.max_polls
                )));
            }
            AnalysisStatus::Error | AnalysisStatus::Unavailable => {
                return Err(EnrichmentError::Analysis(format!(
                    "{} ended with status {:?}",
                    analysis.id, analysis.status
                )));
            }
            AnalysisStatus::Complete | AnalysisStatus::Unknown => {}
        }

        if let Some(song_id) = &analysis.song_id {
            let songs = self
                .remote
                .song_profile(std::slice::from_ref(song_id))
                .await?;
            if let Some(song) = songs.and_then(|s| s.into_iter().next()) {
                return Ok(Some(ResolutionResult::Song(song)));
            }
        }

        if analysis.audio_summary.is_empty() {
            return Err(EnrichmentError::Analysis(format!(
                "{} has no audio summary",
                analysis.id
            )));
        }
        Ok(Some(ResolutionResult::RawFeatures(RawFeatureSet {
            features: analysis.audio_summary,
        })))
    }
}
