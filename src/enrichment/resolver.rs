//! Song resolution: runs the strategies in order until one produces a result.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use super::domain::ResolutionResult;
use super::fingerprint::FingerprintProvider;
use super::strategies::{
    AnalyzeOptions, AnalyzeStrategy, IdentifyStrategy, ProfileStrategy, ResolutionStrategy,
    RetryingApi, SearchStrategy,
};
use super::traits::Transcoder;
use crate::model::Track;

/// Ordered chain of resolution strategies. The first result wins.
pub struct SongResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SongResolver {
    pub fn new(strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        Self {
            strategies,
            cancel: None,
        }
    }

    /// Profile, then Search, then Identify, then Analyze.
    pub fn standard(
        remote: RetryingApi,
        fingerprints: FingerprintProvider,
        transcoder: Arc<dyn Transcoder>,
        analyze: AnalyzeOptions,
    ) -> Self {
        Self::new(vec![
            Box::new(ProfileStrategy::new(remote.clone())),
            Box::new(SearchStrategy::new(remote.clone())),
            Box::new(IdentifyStrategy::new(remote.clone(), fingerprints)),
            Box::new(AnalyzeStrategy::new(remote, transcoder, analyze)),
        ])
    }

    /// Stop before the next strategy once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Resolve a track to a song or raw feature set.
    pub async fn resolve(&self, track: &mut Track) -> Option<ResolutionResult> {
        for strategy in &self.strategies {
            if self.is_cancelled() {
                info!("echonest: cancelled: {}", track.display_path());
                return None;
            }

            let Some(result) = strategy.attempt(track).await else {
                continue;
            };

            match &result {
                ResolutionResult::Song(song) => debug!(
                    "echonest: got song through {}: {} - {} [{}]",
                    strategy.name(),
                    song.artist_name,
                    song.title,
                    song.duration()
                        .map(|d| format!("{:.1}s", d))
                        .unwrap_or_else(|| "?".to_string())
                ),
                ResolutionResult::RawFeatures(raw) => debug!(
                    "echonest: got {} features through {}: {}",
                    raw.features.len(),
                    strategy.name(),
                    track.display_path()
                ),
            }
            return Some(result);
        }

        info!("echonest: no match: {}", track.display_path());
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::domain::{AnalysisStatus, EnrichmentError, RemoteTrack, Song};
    use crate::enrichment::retry::{RetryPolicy, RetryingClient};
    use crate::enrichment::traits::mocks::{MockCodegen, MockEchoNest, MockTranscoder, Script};
    use std::time::Duration;

    fn resolver(mock: &Arc<MockEchoNest>, codegen: Arc<MockCodegen>) -> SongResolver {
        let retry = RetryingClient::new(RetryPolicy::new(2, Duration::ZERO));
        SongResolver::standard(
            RetryingApi::new(mock.clone(), retry.clone()),
            FingerprintProvider::new(codegen, retry),
            Arc::new(MockTranscoder::default()),
            AnalyzeOptions {
                poll_interval: Duration::ZERO,
                ..Default::default()
            },
        )
    }

    fn song(id: &str, duration: f64) -> Song {
        Song {
            id: id.to_string(),
            artist_name: "A".into(),
            title: "T".into(),
            audio_summary: [("duration".to_string(), duration)].into_iter().collect(),
            score: Some(50.0),
        }
    }

    #[test]
    fn test_standard_order() {
        let mock = Arc::new(MockEchoNest::default());
        let resolver = resolver(&mock, Arc::new(MockCodegen::default()));
        assert_eq!(
            resolver.strategy_names(),
            vec!["profile", "search", "identify", "analyze"]
        );
    }

    #[tokio::test]
    async fn test_falls_through_to_analyze() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"audio").unwrap();

        let mock = Arc::new(MockEchoNest {
            upload: Script::always(Ok(RemoteTrack {
                id: "TRNEW".into(),
                song_id: None,
                status: AnalysisStatus::Complete,
                audio_summary: [("energy".to_string(), 0.3)].into_iter().collect(),
            })),
            ..Default::default()
        });
        let codegen = Arc::new(MockCodegen::with_error(EnrichmentError::Fingerprint(
            "no codegen".into(),
        )));
        let mut track = Track::new(&path, "A", "T", 100.0);

        let result = resolver(&mock, codegen.clone()).resolve(&mut track).await;

        assert!(matches!(result, Some(ResolutionResult::RawFeatures(_))));
        assert_eq!(codegen.call_count(), 1);
        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("song/search:"));
        assert!(calls[1].starts_with("track/upload:mp3:"));
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let mock = Arc::new(MockEchoNest {
            search: Script::always(Ok(vec![song("SOS", 100.0)])),
            identify: Script::always(Ok(vec![song("SOI", 100.0)])),
            ..Default::default()
        });
        let codegen = Arc::new(MockCodegen::with_code("eJx"));
        let mut track = Track::new("/a.mp3", "A", "T", 100.0);

        let result = resolver(&mock, codegen.clone()).resolve(&mut track).await;

        assert_eq!(result.unwrap().song_id(), Some("SOS"));
        assert_eq!(codegen.call_count(), 0);
        assert_eq!(mock.count("song/identify"), 0);
    }

    #[tokio::test]
    async fn test_failing_strategy_does_not_abort_chain() {
        let mock = Arc::new(MockEchoNest {
            search: Script::always(Err(EnrichmentError::Api {
                code: 1,
                message: "boom".into(),
            })),
            identify: Script::always(Ok(vec![song("SOI", 100.0)])),
            ..Default::default()
        });
        let mut track = Track::new("/a.mp3", "A", "T", 100.0);

        let result = resolver(&mock, Arc::new(MockCodegen::with_code("eJx")))
            .resolve(&mut track)
            .await;

        assert_eq!(result.unwrap().song_id(), Some("SOI"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_strategy() {
        let mock = Arc::new(MockEchoNest::default());
        let flag = Arc::new(AtomicBool::new(true));
        let mut track = Track::new("/a.mp3", "A", "T", 100.0);

        let result = resolver(&mock, Arc::new(MockCodegen::default()))
            .with_cancel_flag(flag)
            .resolve(&mut track)
            .await;

        assert!(result.is_none());
        assert!(mock.calls().is_empty());
    }
}
