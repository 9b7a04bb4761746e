//! Acoustic attribute fetching command.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use sqlx::SqlitePool;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::config::Config;
use crate::enrichment::{
    ApplyEngine, EchoNestClient, EchoprintCodegen, FetchOptions, FetchService, FfmpegTranscoder,
    FingerprintProvider, LibraryWriter, RetryingApi, RetryingClient, SongResolver,
};

use super::{collect_tracks, open_library};

/// Wire the fetch pipeline from configuration.
fn build_service(
    config: &Config,
    api_key: &str,
    pool: Option<SqlitePool>,
) -> anyhow::Result<FetchService> {
    let client = EchoNestClient::new(api_key).context("Failed to create Echo Nest client")?;
    let retry = RetryingClient::new(config.fetch.retry_policy());
    let remote = RetryingApi::new(Arc::new(client), retry.clone());
    let fingerprints = FingerprintProvider::new(
        Arc::new(EchoprintCodegen::new(config.fetch.codegen.clone())),
        retry,
    );
    let resolver = SongResolver::standard(
        remote,
        fingerprints,
        Arc::new(FfmpegTranscoder::default()),
        config.fetch.analyze_options(),
    );
    let apply = ApplyEngine::new(
        config.fetch.attributes.clone(),
        config.fetch.write,
        Arc::new(LibraryWriter::new(pool)),
    );
    Ok(FetchService::new(
        resolver,
        apply,
        config.fetch.attributes.clone(),
    ))
}

/// Fetch acoustic attributes for every track under `path`
pub fn cmd_fetch(rt: &Runtime, config: &Config, path: &Path, recursive: bool) -> anyhow::Result<()> {
    let Some(api_key) = config.credentials.api_key.as_deref() else {
        anyhow::bail!(
            "Echo Nest API key required. Use --api-key YOUR_KEY, set ECHONEST_API_KEY, \
             or add api_key under [credentials] in the config file"
        );
    };

    rt.block_on(async {
        // Opened even without write-back: stored ids and values feed resolution.
        let pool = open_library(config)
            .await
            .context("Failed to open library database")?;

        let mut tracks = collect_tracks(path, recursive, Some(&pool)).await;
        if tracks.is_empty() {
            println!("No audio files found.");
            return Ok(());
        }
        if !config.fetch.write {
            println!("Write-back disabled - no tags or library records will change\n");
        }
        println!("Fetching attributes for {} file(s)...\n", tracks.len());

        let service = build_service(config, api_key, Some(pool))?;

        let cancel = service.cancel_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, applying tracks resolved so far");
                cancel.store(true, Ordering::Relaxed);
            }
        });

        let options = FetchOptions {
            force: config.fetch.force,
            concurrency: config.fetch.concurrency,
        };
        let summary = service.run(&mut tracks, &options).await;

        for track in &tracks {
            if track.attributes.is_empty() {
                continue;
            }
            let values: Vec<String> = config
                .fetch
                .attributes
                .iter()
                .filter_map(|name| track.attribute(name).map(|v| format!("{}={:.3}", name, v)))
                .collect();
            info!("{}: {}", track.display_path(), values.join(" "));
        }

        println!();
        println!(
            "Done! {} resolved, {} unresolved, {} skipped ({} updated, {} unchanged)",
            summary.resolved, summary.unresolved, summary.skipped, summary.updated, summary.unchanged
        );
        if summary.cancelled {
            println!("Cancelled before all tracks were resolved.");
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_requires_api_key() {
        let rt = Runtime::new().unwrap();
        let config = Config::default();
        let err = cmd_fetch(&rt, &config, Path::new("/nonexistent"), false).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    fn offline_config(db_dir: &Path) -> Config {
        let mut config = Config::default();
        config.credentials.api_key = Some("KEY".into());
        config.fetch.write = false;
        config.library.db_path = Some(db_dir.join("library.db"));
        config
    }

    #[test]
    fn test_fetch_without_files_succeeds() {
        let rt = Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = offline_config(dir.path());

        assert!(cmd_fetch(&rt, &config, dir.path(), true).is_ok());
    }

    #[test]
    fn test_no_write_still_opens_library() {
        let rt = Runtime::new().unwrap();
        let music = tempfile::tempdir().unwrap();
        let db_dir = tempfile::tempdir().unwrap();
        let config = offline_config(&db_dir.path().join("nested"));

        cmd_fetch(&rt, &config, music.path(), true).unwrap();

        assert!(db_dir.path().join("nested").join("library.db").exists());
    }
}
