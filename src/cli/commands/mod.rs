//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `fetch`: Resolve tracks and fetch their acoustic attributes
//! - `show`: Display stored attributes as labels, with filters
//! - `tools`: Check the external tools and API key

mod fetch;
mod show;
mod tools;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::config::{self, Config};
use crate::model::Track;
use crate::{db, metadata, scanner};

pub use fetch::cmd_fetch;
pub use show::cmd_show;
pub use tools::cmd_check_tools;

/// Music Features CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the OS config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch acoustic attributes from the Echo Nest
    Fetch {
        /// Path to file or directory to fetch for
        path: PathBuf,
        /// Echo Nest API key (or set ECHONEST_API_KEY env var)
        #[arg(short, long, env = "ECHONEST_API_KEY")]
        api_key: Option<String>,
        /// Recursive directory scan
        #[arg(short, long)]
        recursive: bool,
        /// Re-fetch tracks that already have every attribute
        #[arg(short, long)]
        force: bool,
        /// Do not write tags or update the library
        #[arg(long)]
        no_write: bool,
        /// Tracks resolved in parallel
        #[arg(long)]
        concurrency: Option<usize>,
        /// Library database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show attributes stored in the library
    Show {
        /// Filter such as `energy:high,very high` or `tempo:>120` (repeatable)
        #[arg(short = 'w', long = "where")]
        filters: Vec<String>,
        /// Show raw numbers instead of labels
        #[arg(long)]
        raw: bool,
        /// Library database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Check if codegen and ffmpeg are installed
    CheckTools,
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was specified.
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };

    let Some(command) = &cli.command else {
        return Ok(false);
    };
    let rt = Runtime::new()?;

    match command {
        Commands::Fetch {
            path,
            api_key,
            recursive,
            force,
            no_write,
            concurrency,
            db,
        } => {
            let mut config = config;
            if let Some(key) = api_key {
                config.credentials.api_key = Some(key.clone());
            }
            if *force {
                config.fetch.force = true;
            }
            if *no_write {
                config.fetch.write = false;
            }
            if let Some(n) = concurrency {
                config.fetch.concurrency = *n;
            }
            if let Some(db) = db {
                config.library.db_path = Some(db.clone());
            }
            cmd_fetch(&rt, &config, path, *recursive)?;
        }
        Commands::Show { filters, raw, db } => {
            let mut config = config;
            if let Some(db) = db {
                config.library.db_path = Some(db.clone());
            }
            cmd_show(&rt, &config, filters, *raw)?;
        }
        Commands::CheckTools => cmd_check_tools(&rt, &config)?,
    }
    Ok(true)
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Open the library database at the configured path.
pub(crate) async fn open_library(config: &Config) -> anyhow::Result<SqlitePool> {
    let path = config.library.resolved_db_path();
    if let Some(dir) = path.as_deref().and_then(Path::parent)
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    let url = db::db_url(path.as_deref());
    debug!("Opening library {}", url);
    Ok(db::init_db(&url).await?)
}

/// Read every audio file under `path`, merged with what the library knows.
///
/// Unreadable files are logged and left out.
pub(crate) async fn collect_tracks(
    path: &Path,
    recursive: bool,
    pool: Option<&SqlitePool>,
) -> Vec<Track> {
    let files: Vec<PathBuf> = scanner::scan(path.to_path_buf(), recursive).collect().await;
    let mut tracks = Vec::with_capacity(files.len());

    for file in files {
        let read = {
            let file = file.clone();
            tokio::task::spawn_blocking(move || metadata::read_track(&file)).await
        };
        let mut track = match read {
            Ok(Ok(track)) => track,
            Ok(Err(e)) => {
                warn!("Skipping {}: {:#}", file.display(), e);
                continue;
            }
            Err(e) => {
                warn!("Skipping {}: {}", file.display(), e);
                continue;
            }
        };

        if let Some(pool) = pool {
            match db::get_track(pool, &track.path).await {
                Ok(Some(stored)) => merge_stored(&mut track, stored),
                Ok(None) => {}
                Err(e) => warn!("Library lookup failed for {}: {}", file.display(), e),
            }
        }
        tracks.push(track);
    }

    tracks
}

/// Fill in values the file's tags lack from the library record.
fn merge_stored(track: &mut Track, stored: Track) {
    if track.remote_id.is_none() {
        track.remote_id = stored.remote_id;
    }
    if track.fingerprint.is_none() {
        track.fingerprint = stored.fingerprint;
    }
    for (name, value) in stored.attributes {
        track.attributes.entry(name).or_insert(value);
    }
}
