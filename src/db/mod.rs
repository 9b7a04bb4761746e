//! Library database for enriched tracks.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Each track row is keyed by its path; acoustic attributes live in
//! `track_attributes`, one row per (track, name).
//!
//! # Example
//!
//! ```ignore
//! use music_features::db::{init_db, get_all_tracks};
//!
//! let pool = init_db("sqlite:music_features.db").await?;
//! let tracks = get_all_tracks(&pool).await?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::Track;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "music_features.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TrackRow {
    id: i64,
    path: String,
    artist: String,
    title: String,
    length_seconds: f64,
    format: String,
    mb_trackid: Option<String>,
    remote_id: Option<String>,
    fingerprint: Option<String>,
}

impl TrackRow {
    fn into_track(self) -> Track {
        Track {
            path: PathBuf::from(self.path),
            artist: self.artist,
            title: self.title,
            length_seconds: self.length_seconds,
            format: self.format,
            mb_trackid: self.mb_trackid,
            remote_id: self.remote_id,
            fingerprint: self.fingerprint,
            attributes: Default::default(),
        }
    }
}

const TRACK_COLUMNS: &str =
    "id, path, artist, title, length_seconds, format, mb_trackid, remote_id, fingerprint";

/// Insert or update a track and replace its attributes.
///
/// Runs in a single transaction. Returns the track's database ID.
pub async fn upsert_track(pool: &SqlitePool, track: &Track) -> sqlx::Result<i64> {
    let mut tx = pool.begin().await?;
    let now = chrono::Utc::now().to_rfc3339();

    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO tracks (path, artist, title, length_seconds, format, mb_trackid, remote_id, fingerprint, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET
            artist = excluded.artist,
            title = excluded.title,
            length_seconds = excluded.length_seconds,
            format = excluded.format,
            mb_trackid = excluded.mb_trackid,
            remote_id = excluded.remote_id,
            fingerprint = excluded.fingerprint,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(track.path.to_string_lossy().as_ref())
    .bind(&track.artist)
    .bind(&track.title)
    .bind(track.length_seconds)
    .bind(&track.format)
    .bind(&track.mb_trackid)
    .bind(&track.remote_id)
    .bind(&track.fingerprint)
    .bind(&now)
    .fetch_one(&mut *tx)
    .await?;
    let track_id = row.0;

    sqlx::query("DELETE FROM track_attributes WHERE track_id = ?")
        .bind(track_id)
        .execute(&mut *tx)
        .await?;

    for (name, value) in &track.attributes {
        sqlx::query("INSERT INTO track_attributes (track_id, name, value) VALUES (?, ?, ?)")
            .bind(track_id)
            .bind(name)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(track_id)
}

/// Get a track by its path, with attributes.
pub async fn get_track(pool: &SqlitePool, path: &Path) -> sqlx::Result<Option<Track>> {
    let row = sqlx::query_as::<_, TrackRow>(&format!(
        "SELECT {} FROM tracks WHERE path = ?",
        TRACK_COLUMNS
    ))
    .bind(path.to_string_lossy().as_ref())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let attributes: Vec<(String, f64)> =
        sqlx::query_as("SELECT name, value FROM track_attributes WHERE track_id = ?")
            .bind(row.id)
            .fetch_all(pool)
            .await?;

    let mut track = row.into_track();
    track.attributes = attributes.into_iter().collect();
    Ok(Some(track))
}

/// Get all tracks with their attributes, ordered by path.
pub async fn get_all_tracks(pool: &SqlitePool) -> sqlx::Result<Vec<Track>> {
    let rows = sqlx::query_as::<_, TrackRow>(&format!(
        "SELECT {} FROM tracks ORDER BY path",
        TRACK_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    let attributes: Vec<(i64, String, f64)> =
        sqlx::query_as("SELECT track_id, name, value FROM track_attributes")
            .fetch_all(pool)
            .await?;

    let mut by_track: HashMap<i64, Vec<(String, f64)>> = HashMap::new();
    for (track_id, name, value) in attributes {
        by_track.entry(track_id).or_default().push((name, value));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let values = by_track.remove(&row.id).unwrap_or_default();
            let mut track = row.into_track();
            track.attributes = values.into_iter().collect();
            track
        })
        .collect())
}
