//! Test utilities and fixtures for music-features tests.
//!
//! This module provides common test helpers and database utilities to reduce
//! boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use music_features::test_utils::{temp_db, mock_track};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let track = mock_track("/music/song.mp3");
//!     // ... test logic
//! }
//! ```

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::model::Track;

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically. Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Creates a Track at `path` with sensible defaults and no attributes.
///
/// Customize with struct update syntax:
///
/// ```ignore
/// let track = Track { mb_trackid: Some("...".into()), ..mock_track("/a.mp3") };
/// ```
pub fn mock_track(path: &str) -> Track {
    Track::new(path, "Test Artist", "Test Track", 180.0)
}

/// Writes a silent 8 kHz mono 16-bit PCM WAV file of `seconds` length.
pub fn write_wav(dir: &Path, name: &str, seconds: u32) -> PathBuf {
    const SAMPLE_RATE: u32 = 8000;
    const BYTES_PER_SAMPLE: u16 = 2;

    let data_len = SAMPLE_RATE * seconds * u32::from(BYTES_PER_SAMPLE);
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    bytes.extend_from_slice(&(SAMPLE_RATE * u32::from(BYTES_PER_SAMPLE)).to_le_bytes());
    bytes.extend_from_slice(&BYTES_PER_SAMPLE.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);

    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("Failed to write WAV fixture");
    path
}

/// Writes a FLAC file holding only a STREAMINFO block for `seconds` of
/// 44.1 kHz mono 16-bit audio. Enough for tag reading and writing.
pub fn write_flac(dir: &Path, name: &str, seconds: u32) -> PathBuf {
    const SAMPLE_RATE: u64 = 44_100;

    let total_samples = SAMPLE_RATE * u64::from(seconds);
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"fLaC");
    // Last metadata block, type STREAMINFO, 34 bytes
    bytes.push(0x80);
    bytes.extend_from_slice(&34u32.to_be_bytes()[1..]);
    bytes.extend_from_slice(&4096u16.to_be_bytes()); // min block size
    bytes.extend_from_slice(&4096u16.to_be_bytes()); // max block size
    bytes.extend_from_slice(&[0; 6]); // min/max frame size
    // sample rate (20) | channels - 1 (3) | bits per sample - 1 (5) | samples high (4)
    let info = (SAMPLE_RATE as u32) << 12 | 15 << 4 | ((total_samples >> 32) as u32 & 0xF);
    bytes.extend_from_slice(&info.to_be_bytes());
    bytes.extend_from_slice(&(total_samples as u32).to_be_bytes());
    bytes.extend_from_slice(&[0; 16]); // MD5
    bytes.extend_from_slice(&[0xFF, 0xF8, 0x69, 0x08]); // start of a frame header

    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("Failed to write FLAC fixture");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;

        let tracks = crate::db::get_all_tracks(&pool).await.unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_mock_track_defaults() {
        let track = mock_track("/music/song.mp3");
        assert_eq!(track.artist, "Test Artist");
        assert_eq!(track.title, "Test Track");
        assert_eq!(track.format, "mp3");
        assert!(track.attributes.is_empty());
    }

    #[test]
    fn test_write_wav_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "a.wav", 2);
        assert_eq!(std::fs::metadata(path).unwrap().len(), 44 + 32000);
    }

    #[test]
    fn test_write_flac_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_flac(dir.path(), "a.flac", 3);

        let track = crate::metadata::read_track(&path).unwrap();
        assert_eq!(track.format, "flac");
        assert!((track.length_seconds - 3.0).abs() < 0.1);
    }
}
