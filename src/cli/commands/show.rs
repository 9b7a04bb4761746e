//! Display stored attributes as labels.

use tokio::runtime::Runtime;

use crate::attributes::{AttributeFilter, MappingConfig};
use crate::config::Config;
use crate::db;
use crate::model::Track;

use super::open_library;

/// One line per attribute, mapped through the configured labels.
fn describe(track: &Track, attributes: &[String], mapping: &MappingConfig, raw: bool) -> Vec<String> {
    attributes
        .iter()
        .map(|name| {
            let value = track.attribute(name);
            let shown = match value {
                Some(v) if raw => format!("{:.3}", v),
                _ => mapping.display(name, value),
            };
            format!("{:>14}: {}", name, shown)
        })
        .collect()
}

/// Show library tracks matching every filter
pub fn cmd_show(rt: &Runtime, config: &Config, filters: &[String], raw: bool) -> anyhow::Result<()> {
    let filters = filters
        .iter()
        .map(|expr| AttributeFilter::parse(expr, &config.mapping))
        .collect::<Result<Vec<_>, _>>()?;

    rt.block_on(async {
        let pool = open_library(config).await?;
        let tracks = db::get_all_tracks(&pool).await?;

        let mut shown = 0;
        for track in tracks
            .iter()
            .filter(|t| filters.iter().all(|f| f.matches(t)))
        {
            shown += 1;
            println!("{} - {}", track.artist, track.title);
            println!("  {}", track.display_path());
            for line in describe(track, &config.fetch.attributes, &config.mapping, raw) {
                println!("  {}", line);
            }
            println!();
        }

        println!("{} of {} tracks", shown, tracks.len());
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_maps_labels() {
        let mut track = Track::new("/a.mp3", "A", "T", 100.0);
        track.attributes.insert("danceability".into(), 0.9);
        track.attributes.insert("tempo".into(), 128.0);
        let attributes = vec!["danceability".to_string(), "tempo".into(), "energy".into()];

        let lines = describe(&track, &attributes, &MappingConfig::default(), false);

        assert!(lines[0].ends_with("danceability: disco"));
        assert!(lines[1].ends_with("tempo: 128.00"));
        assert!(lines[2].ends_with("energy: not set"));
    }

    #[test]
    fn test_describe_raw() {
        let mut track = Track::new("/a.mp3", "A", "T", 100.0);
        track.attributes.insert("danceability".into(), 0.9);
        let attributes = vec!["danceability".to_string()];

        let lines = describe(&track, &attributes, &MappingConfig::default(), true);
        assert!(lines[0].ends_with("danceability: 0.900"));
    }

    #[test]
    fn test_show_rejects_bad_filter() {
        let rt = Runtime::new().unwrap();
        let err = cmd_show(&rt, &Config::default(), &["energy".to_string()], false).unwrap_err();
        assert!(err.to_string().contains("invalid filter"));
    }

    #[test]
    fn test_show_reads_library() {
        let rt = Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.library.db_path = Some(dir.path().join("library.db"));

        rt.block_on(async {
            let pool = open_library(&config).await.unwrap();
            let mut track = Track::new("/a.mp3", "A", "T", 100.0);
            track.attributes.insert("energy".into(), 0.9);
            db::upsert_track(&pool, &track).await.unwrap();
        });

        assert!(cmd_show(&rt, &config, &["energy:very high".to_string()], false).is_ok());
    }
}
