//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\music-features\config.toml
//! - macOS: ~/Library/Application Support/music-features/config.toml
//! - Linux: ~/.config/music-features/config.toml
//!
//! The config file is human-readable and editable. Command-line flags
//! override the values loaded here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::attributes::MappingConfig;
use crate::enrichment::{AnalyzeOptions, RetryPolicy};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials (keep separate for potential future encryption)
    pub credentials: Credentials,

    /// Fetch pipeline settings
    pub fetch: FetchConfig,

    /// Label mappings for display and filtering
    pub mapping: MappingConfig,

    /// Library settings
    pub library: LibraryConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Echo Nest API key
    pub api_key: Option<String>,
}

/// Fetch pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Path to the echoprint-codegen binary (searched for if unset)
    pub codegen: Option<PathBuf>,

    /// Attributes to fetch and store
    pub attributes: Vec<String>,

    /// Write attributes to files and the library
    pub write: bool,

    /// Re-fetch tracks that already have every attribute
    pub force: bool,

    /// Upload audio for analysis when nothing else matches
    pub upload: bool,

    /// Convert unsupported formats before upload
    pub convert: bool,

    /// Tracks resolved in parallel
    pub concurrency: usize,

    /// Attempts per remote call
    pub retries: u32,

    /// Seconds to wait between attempts
    pub retry_interval_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            codegen: None,
            attributes: [
                "energy",
                "liveness",
                "speechiness",
                "acousticness",
                "danceability",
                "valence",
                "tempo",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            write: true,
            force: false,
            upload: true,
            convert: true,
            concurrency: 1,
            retries: crate::enrichment::RETRIES,
            retry_interval_secs: crate::enrichment::RETRY_INTERVAL.as_secs(),
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_secs(self.retry_interval_secs))
    }

    pub fn analyze_options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            upload: self.upload,
            convert: self.convert,
            ..Default::default()
        }
    }
}

/// Library management settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Library database file (defaults to the config directory)
    pub db_path: Option<PathBuf>,
}

impl LibraryConfig {
    /// Database path: the configured one, else `music_features.db` in the
    /// config directory.
    pub fn resolved_db_path(&self) -> Option<PathBuf> {
        self.db_path
            .clone()
            .or_else(|| config_dir().map(|d| d.join(crate::db::DEFAULT_DB_NAME)))
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-features"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            tracing::warn!("Could not determine config directory, using defaults");
            Config::default()
        }
    }
}

/// Load configuration from a specific file, with the same fallbacks as [`load`].
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
