//! Apply stage: merge resolved attributes into tracks and persist them.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use super::cache::MetadataCache;
use super::traits::TrackSink;
use crate::error::{Error, Result, ResultExt};
use crate::model::Track;

/// One attribute whose value changed.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub name: String,
    pub old: Option<f64>,
    pub new: f64,
}

/// What an apply did to a track.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplyReport {
    pub remote_id_changed: bool,
    pub changes: Vec<AttributeChange>,
    /// Tags were written to the file
    pub written: bool,
    /// The library record was updated
    pub stored: bool,
}

impl ApplyReport {
    pub fn is_unchanged(&self) -> bool {
        !self.remote_id_changed && self.changes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied(ApplyReport),
    /// Nothing was cached for the track
    NoMetadata,
}

/// Copies configured attributes from cached results onto tracks.
pub struct ApplyEngine {
    attributes: Vec<String>,
    write_back: bool,
    sink: Arc<dyn TrackSink>,
}

impl ApplyEngine {
    pub fn new(attributes: Vec<String>, write_back: bool, sink: Arc<dyn TrackSink>) -> Self {
        Self {
            attributes,
            write_back,
            sink,
        }
    }

    pub async fn apply(&self, cache: &MetadataCache, track: &mut Track) -> ApplyOutcome {
        let Some(result) = cache.get(&track.path) else {
            warn!("echonest: no metadata available: {}", track.display_path());
            return ApplyOutcome::NoMetadata;
        };

        let mut report = ApplyReport::default();

        if let Some(id) = result.song_id()
            && track.remote_id.as_deref() != Some(id)
        {
            track.remote_id = Some(id.to_string());
            report.remote_id_changed = true;
        }

        let features = result.features();
        for name in &self.attributes {
            let Some(&value) = features.get(name) else {
                continue;
            };
            let old = track.attributes.insert(name.clone(), value);
            if old != Some(value) {
                info!("echonest: metadata: {} - {}", name, value);
                report.changes.push(AttributeChange {
                    name: name.clone(),
                    old,
                    new: value,
                });
            }
        }

        if self.write_back {
            info!("echonest: writing metadata: {}", track.display_path());
            match self.sink.write(track).await {
                Ok(()) => report.written = true,
                Err(e) => error!("echonest: writing tags failed: {}", e),
            }
            match self.sink.store(track).await {
                Ok(()) => report.stored = true,
                Err(e) => error!("echonest: storing track failed: {}", e),
            }
        } else {
            debug!("echonest: write-back disabled: {}", track.display_path());
        }

        ApplyOutcome::Applied(report)
    }
}

/// Persists tracks to their files (lofty) and the library database (sqlx).
#[derive(Debug, Clone, Default)]
pub struct LibraryWriter {
    pool: Option<SqlitePool>,
}

impl LibraryWriter {
    /// Writer that also stores to the library at `pool`, if given.
    pub fn new(pool: Option<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackSink for LibraryWriter {
    async fn write(&self, track: &Track) -> Result<()> {
        let owned = track.clone();
        let written = tokio::task::spawn_blocking(move || crate::metadata::write_attributes(&owned))
            .await
            .map_err(|e| Error::metadata(&track.path, e.to_string()))?
            .map_err(|e| Error::metadata(&track.path, format!("{:#}", e)))?;
        debug!("echonest: wrote {} tags to {}", written, track.display_path());
        Ok(())
    }

    async fn store(&self, track: &Track) -> Result<()> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };
        crate::db::upsert_track(pool, track)
            .await
            .with_context(format!("storing {}", track.display_path()))?;
        Ok(())
    }
}
