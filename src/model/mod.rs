//! Core data model for local tracks.
//!
//! A [`Track`] is the local audio item the enrichment pipeline works on. It is
//! read from the file's tags (see [`crate::metadata`]) or from the library
//! database (see [`crate::db`]) and only mutated by the apply stage and the
//! fingerprint cache.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A local audio file and the attributes known about it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    /// Absolute file path (unique identifier)
    pub path: PathBuf,
    /// Artist name from tags
    pub artist: String,
    /// Track title from tags
    pub title: String,
    /// Playback length in seconds
    pub length_seconds: f64,
    /// Lower-case container extension ("mp3", "flac", ...)
    pub format: String,
    /// MusicBrainz recording ID, if tagged
    pub mb_trackid: Option<String>,
    /// Remote song ID recorded by a previous enrichment
    pub remote_id: Option<String>,
    /// Cached perceptual fingerprint code
    pub fingerprint: Option<String>,
    /// Acoustic attributes (energy, tempo, ...)
    pub attributes: BTreeMap<String, f64>,
}

impl Track {
    /// Create a track with the identifying fields set.
    pub fn new(
        path: impl Into<PathBuf>,
        artist: impl Into<String>,
        title: impl Into<String>,
        length_seconds: f64,
    ) -> Self {
        let path = path.into();
        let format = format_of(&path);
        Self {
            path,
            artist: artist.into(),
            title: title.into(),
            length_seconds,
            format,
            ..Default::default()
        }
    }

    /// Whether the track already carries every one of the given attributes.
    pub fn has_all_attributes(&self, names: &[String]) -> bool {
        names.iter().all(|name| self.attributes.contains_key(name))
    }

    /// Value of a numeric attribute.
    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).copied()
    }

    /// Human-readable path for log lines.
    pub fn display_path(&self) -> std::path::Display<'_> {
        self.path.display()
    }
}

/// Lower-case extension of a path, or an empty string.
pub fn format_of(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_derives_format_from_extension() {
        let track = Track::new("/music/Song.FLAC", "Artist", "Song", 200.0);
        assert_eq!(track.format, "flac");
        assert!(track.attributes.is_empty());
        assert!(track.remote_id.is_none());
    }

    #[test]
    fn test_format_of_without_extension() {
        assert_eq!(format_of(Path::new("/music/noext")), "");
    }

    #[test]
    fn test_has_all_attributes() {
        let mut track = Track::new("/a.mp3", "A", "T", 100.0);
        let wanted = vec!["energy".to_string(), "tempo".to_string()];
        assert!(!track.has_all_attributes(&wanted));

        track.attributes.insert("energy".to_string(), 0.5);
        assert!(!track.has_all_attributes(&wanted));

        track.attributes.insert("tempo".to_string(), 120.0);
        assert!(track.has_all_attributes(&wanted));
        assert!(track.has_all_attributes(&[]));
    }
}
