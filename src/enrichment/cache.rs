//! Run-scoped store of resolution results, keyed by track path.
//!
//! One cache lives for one fetch run and is passed explicitly from the
//! resolution stage to the apply stage. The map is shared between
//! concurrently resolved tracks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::warn;

use super::domain::ResolutionResult;

#[derive(Debug, Default)]
pub struct MetadataCache {
    results: RwLock<HashMap<PathBuf, ResolutionResult>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result for a path.
    ///
    /// The first value for a path is kept; a second insert is rejected and
    /// returns `false`.
    pub fn insert(&self, path: impl Into<PathBuf>, result: ResolutionResult) -> bool {
        let path = path.into();
        let mut results = self.results.write();
        if results.contains_key(&path) {
            warn!(
                "echonest: result for {} already cached, keeping the first",
                path.display()
            );
            return false;
        }
        results.insert(path, result);
        true
    }

    pub fn get(&self, path: &Path) -> Option<ResolutionResult> {
        self.results.read().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.results.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::domain::{RawFeatureSet, Song};

    fn song(id: &str) -> ResolutionResult {
        ResolutionResult::Song(Song {
            id: id.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_insert_and_get() {
        let cache = MetadataCache::new();
        assert!(cache.is_empty());

        assert!(cache.insert("/a.mp3", song("SO1")));
        assert!(cache.contains(Path::new("/a.mp3")));
        assert_eq!(cache.get(Path::new("/a.mp3")), Some(song("SO1")));
        assert_eq!(cache.get(Path::new("/b.mp3")), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_first_value_is_kept() {
        let cache = MetadataCache::new();
        assert!(cache.insert("/a.mp3", song("SO1")));
        assert!(!cache.insert(
            "/a.mp3",
            ResolutionResult::RawFeatures(RawFeatureSet::default())
        ));
        assert_eq!(cache.get(Path::new("/a.mp3")), Some(song("SO1")));
    }

    #[test]
    fn test_concurrent_inserts_keyed_by_path() {
        let cache = std::sync::Arc::new(MetadataCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.insert(format!("/t{}.mp3", i), song("SO")))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.len(), 8);
    }
}
