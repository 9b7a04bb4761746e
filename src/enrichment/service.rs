//! Fetch service - orchestrates resolution and apply for a batch of tracks
//!
//! This is the high-level API behind the `fetch` command:
//! 1. Skip tracks that already carry every configured attribute (unless forced)
//! 2. Resolve the rest into a run-scoped [`MetadataCache`]
//! 3. Apply cached results to each processed track (and persist them)
//!
//! A failing track never aborts the batch. Cancelling stops new resolutions;
//! results already resolved are still applied.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::apply::{ApplyEngine, ApplyOutcome};
use super::cache::MetadataCache;
use super::resolver::SongResolver;
use crate::model::Track;

/// Per-run options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Re-fetch tracks that already have every attribute
    pub force: bool,
    /// Tracks resolved at the same time
    pub concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            force: false,
            concurrency: 1,
        }
    }
}

/// Counts for one fetch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub total: usize,
    /// Already complete, not fetched
    pub skipped: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Applied with at least one changed value
    pub updated: usize,
    /// Applied, nothing changed
    pub unchanged: usize,
    pub cancelled: bool,
}

/// Service running the resolve and apply stages over many tracks
pub struct FetchService {
    resolver: SongResolver,
    apply: ApplyEngine,
    attributes: Vec<String>,
    cancel: Arc<AtomicBool>,
}

impl FetchService {
    /// `attributes` decides which tracks are already complete.
    pub fn new(resolver: SongResolver, apply: ApplyEngine, attributes: Vec<String>) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        Self {
            resolver: resolver.with_cancel_flag(cancel.clone()),
            apply,
            attributes,
            cancel,
        }
    }

    /// Use `flag` instead of the service's own cancel flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.resolver = self.resolver.with_cancel_flag(flag.clone());
        self.cancel = flag;
        self
    }

    /// Flag that stops resolution once set (checked between tracks and strategies).
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Whether a track should be fetched.
    pub fn needs_fetch(&self, track: &Track, force: bool) -> bool {
        force || !track.has_all_attributes(&self.attributes)
    }

    async fn resolve_one(&self, track: &mut Track, cache: &MetadataCache) -> bool {
        if self.is_cancelled() {
            return false;
        }
        info!(
            "echonest: {} - {} [{:.1}]",
            track.artist, track.title, track.length_seconds
        );
        match self.resolver.resolve(track).await {
            Some(result) => cache.insert(track.path.clone(), result),
            None => false,
        }
    }

    /// Fetch and apply attributes for `tracks`, updating them in place.
    pub async fn run(&self, tracks: &mut [Track], options: &FetchOptions) -> FetchSummary {
        let mut summary = FetchSummary {
            total: tracks.len(),
            ..Default::default()
        };

        let selected: HashSet<PathBuf> = tracks
            .iter()
            .filter(|track| {
                let needed = self.needs_fetch(track, options.force);
                if !needed {
                    debug!("echonest: already complete: {}", track.display_path());
                }
                needed
            })
            .map(|track| track.path.clone())
            .collect();
        summary.skipped = summary.total - selected.len();

        let cache = MetadataCache::new();
        let resolved: Vec<bool> = futures::stream::iter(
            tracks
                .iter_mut()
                .filter(|track| selected.contains(&track.path)),
        )
        .map(|track| self.resolve_one(track, &cache))
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

        summary.resolved = resolved.iter().filter(|ok| **ok).count();
        summary.unresolved = resolved.len() - summary.resolved;

        let cancelled = self.is_cancelled();
        for track in tracks.iter_mut() {
            if !selected.contains(&track.path) || (cancelled && !cache.contains(&track.path)) {
                continue;
            }
            match self.apply.apply(&cache, track).await {
                ApplyOutcome::Applied(report) if report.is_unchanged() => summary.unchanged += 1,
                ApplyOutcome::Applied(_) => summary.updated += 1,
                ApplyOutcome::NoMetadata => {}
            }
        }

        summary.cancelled = cancelled;
        if cancelled {
            warn!(
                "echonest: fetch cancelled, applied {} resolved tracks",
                summary.updated + summary.unchanged
            );
        }
        info!(
            "echonest: {} tracks, {} skipped, {} resolved, {} unresolved",
            summary.total, summary.skipped, summary.resolved, summary.unresolved
        );
        summary
    }
}
