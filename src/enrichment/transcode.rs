//! Audio conversion using ffmpeg
//!
//! The analysis upload only accepts a few container formats; everything else
//! is converted to MP3 in a temporary file first.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::process::Command;
use tracing::debug;

use super::domain::EnrichmentError;
use super::traits::Transcoder;

/// Formats the remote analysis accepts as-is.
pub const ACCEPTED_FORMATS: &[&str] = &["mp3", "m4a", "ogg", "wav"];

/// Whether a format can be uploaded without conversion.
pub fn is_accepted_format(format: &str) -> bool {
    ACCEPTED_FORMATS
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(format))
}

/// Converts audio to MP3 with the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check if ffmpeg can be run (for diagnostics)
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn convert(&self, source: &Path) -> Result<TempPath, EnrichmentError> {
        let target = tempfile::Builder::new()
            .prefix("music-features-")
            .suffix(".mp3")
            .tempfile()?
            .into_temp_path();

        debug!(
            "echonest: converting {} to {}",
            source.display(),
            target.display()
        );
        let output = Command::new(&self.binary)
            .args(["-y", "-v", "error", "-i"])
            .arg(source)
            .args(["-codec:a", "libmp3lame", "-q:a", "2"])
            .arg(&*target)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    EnrichmentError::Transcode(format!("{} not found", self.binary.display()))
                }
                _ => EnrichmentError::from(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnrichmentError::Transcode(format!(
                "{}: {}",
                source.display(),
                stderr.trim()
            )));
        }

        Ok(target)
    }
}
