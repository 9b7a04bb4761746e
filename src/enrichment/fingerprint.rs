//! Audio fingerprint generation using echoprint-codegen
//!
//! This module shells out to the `echoprint-codegen` command-line tool to
//! compute the fingerprint code the remote `song/identify` operation expects.
//!
//! The tool is run as `echoprint-codegen <file> 0 30` (offset 0, 30 seconds)
//! and prints a JSON array with one object per file:
//! ```json
//! [{"metadata": {...}, "code_count": 912, "code": "eJxVz...", "tag": 0}]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, warn};

use super::retry::RetryingClient;
use super::traits::Codegen;
use crate::enrichment::domain::EnrichmentError;
use crate::model::Track;

const CODEGEN_NAME: &str = if cfg!(windows) {
    "echoprint-codegen.exe"
} else {
    "echoprint-codegen"
};

/// Common installation paths checked after `PATH`
#[cfg(windows)]
const CODEGEN_PATHS: &[&str] = &[
    r"C:\Program Files\echoprint-codegen\echoprint-codegen.exe",
    r"C:\Program Files (x86)\echoprint-codegen\echoprint-codegen.exe",
];

#[cfg(not(windows))]
const CODEGEN_PATHS: &[&str] = &[
    "/usr/bin/echoprint-codegen",
    "/usr/local/bin/echoprint-codegen",
    "/opt/homebrew/bin/echoprint-codegen",
];

/// Seconds of audio to fingerprint, starting at offset 0
const CODEGEN_DURATION_SECS: u32 = 30;

/// Find the codegen executable: the override if given, else `PATH`, else the
/// common installation paths.
pub fn find_codegen(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return path.is_file().then(|| path.to_path_buf());
    }

    let on_path = std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(CODEGEN_NAME))
            .find(|candidate| candidate.is_file())
    });

    on_path.or_else(|| {
        CODEGEN_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
    })
}

/// Runs the `echoprint-codegen` binary.
#[derive(Debug, Clone, Default)]
pub struct EchoprintCodegen {
    override_path: Option<PathBuf>,
}

impl EchoprintCodegen {
    pub fn new(override_path: Option<PathBuf>) -> Self {
        Self { override_path }
    }

    /// Resolved binary location (for diagnostics)
    pub fn binary(&self) -> Option<PathBuf> {
        find_codegen(self.override_path.as_deref())
    }
}

#[async_trait]
impl Codegen for EchoprintCodegen {
    async fn codegen(&self, path: &Path) -> Result<String, EnrichmentError> {
        let binary = self.binary().ok_or_else(|| {
            EnrichmentError::Fingerprint(
                "echoprint-codegen not found. Install it or set fetch.codegen in the config"
                    .to_string(),
            )
        })?;

        debug!("echonest: running {} on {}", binary.display(), path.display());
        let output = Command::new(&binary)
            .arg(path)
            .arg("0")
            .arg(CODEGEN_DURATION_SECS.to_string())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnrichmentError::Fingerprint(format!(
                "echoprint-codegen failed: {}",
                stderr.trim()
            )));
        }

        parse_codegen_json(&String::from_utf8_lossy(&output.stdout))
    }
}

/// One entry of the codegen JSON output
#[derive(serde::Deserialize)]
struct CodegenOutput {
    code: Option<String>,
    error: Option<String>,
}

/// Parse the JSON output and return the first entry's code
fn parse_codegen_json(json: &str) -> Result<String, EnrichmentError> {
    let entries: Vec<CodegenOutput> = serde_json::from_str(json).map_err(|e| {
        EnrichmentError::Fingerprint(format!("Failed to parse codegen output: {}", e))
    })?;

    let first = entries
        .into_iter()
        .next()
        .ok_or_else(|| EnrichmentError::Fingerprint("codegen returned no entries".into()))?;

    if let Some(err) = first.error {
        return Err(EnrichmentError::Fingerprint(err));
    }
    first
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| EnrichmentError::Fingerprint("codegen returned no code".into()))
}

/// Obtains fingerprints for tracks, caching them on the track.
#[derive(Clone)]
pub struct FingerprintProvider {
    codegen: Arc<dyn Codegen>,
    retry: RetryingClient,
}

impl FingerprintProvider {
    pub fn new(codegen: Arc<dyn Codegen>, retry: RetryingClient) -> Self {
        Self { codegen, retry }
    }

    /// The track's fingerprint, computing and caching it if needed.
    ///
    /// Failures are logged and yield `None`.
    pub async fn fingerprint(&self, track: &mut Track) -> Option<String> {
        if let Some(code) = &track.fingerprint {
            return Some(code.clone());
        }

        let codegen = &*self.codegen;
        let path = track.path.clone();
        let target = path.as_path();
        let outcome = self
            .retry
            .invoke("codegen", move || codegen.codegen(target))
            .await
            .into_result("codegen");

        match outcome {
            Ok(Some(code)) => {
                debug!("echonest: fingerprinted {}", path.display());
                track.fingerprint = Some(code.clone());
                Some(code)
            }
            Ok(None) => {
                warn!("echonest: fingerprinting failed: {}: no code", path.display());
                None
            }
            Err(e) => {
                error!("echonest: fingerprinting failed: {}: {}", path.display(), e);
                None
            }
        }
    }
}
