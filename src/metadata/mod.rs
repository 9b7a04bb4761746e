//! Audio file metadata reading and writing.
//!
//! Uses the lofty crate for format-independent metadata access.
//!
//! Acoustic attributes are stored as free-form text items named
//! `ECHONEST_<ATTRIBUTE>` (e.g. `ECHONEST_ENERGY`), next to `ECHONEST_ID`
//! (remote song id) and `ECHONEST_FINGERPRINT`. Other items in the tag are
//! left untouched.
//!
//! ID3v2 stores them as `TXXX` frames, Vorbis comments and APE as plain
//! fields, MP4 as `----:com.apple.iTunes:` freeform atoms. Files whose
//! primary tag has no free-form items are rejected on write.

use std::path::Path;

use anyhow::{Context, Result};
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, ItemValue, Tag, TagExt, TagItem, TagType};

use crate::model::Track;

/// Prefix of every item this crate writes.
pub const TAG_PREFIX: &str = "ECHONEST_";

const REMOTE_ID_NAME: &str = "ID";
const FINGERPRINT_NAME: &str = "FINGERPRINT";

/// Mean of the MP4 freeform atoms we write.
const MP4_FREEFORM_PREFIX: &str = "----:com.apple.iTunes:";

/// Tag item key for an attribute, remote id or fingerprint name.
pub fn tag_key(tag_type: TagType, name: &str) -> Result<ItemKey> {
    let field = format!("{}{}", TAG_PREFIX, name.to_uppercase());
    match tag_type {
        TagType::Id3v2 | TagType::VorbisComments | TagType::Ape => Ok(ItemKey::Unknown(field)),
        TagType::Mp4Ilst => Ok(ItemKey::Unknown(format!("{MP4_FREEFORM_PREFIX}{field}"))),
        other => anyhow::bail!("{other:?} tags cannot hold free-form items"),
    }
}

/// Name encoded in a tag key, if it is one of ours (lower-case).
fn attribute_name(key: &str) -> Option<String> {
    let field = key.rsplit(':').next().unwrap_or(key);
    let upper = field.to_uppercase();
    upper
        .strip_prefix(TAG_PREFIX)
        .filter(|name| !name.is_empty())
        .map(|name| name.to_lowercase())
}

/// Read a track, its tags and anything a previous enrichment stored.
pub fn read_track(path: &Path) -> Result<Track> {
    let tagged_file = Probe::open(path)
        .context("Failed to open file for probing")?
        .read()
        .context("Failed to read file metadata")?;

    let length_seconds = tagged_file.properties().duration().as_secs_f64();
    let mut track = Track::new(path, "", "", length_seconds);

    // Get the primary tag, or fall back to the first available tag
    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return Ok(track);
    };

    track.artist = tag.artist().map(|s| s.to_string()).unwrap_or_default();
    track.title = tag.title().map(|s| s.to_string()).unwrap_or_default();
    track.mb_trackid = tag
        .get_string(&ItemKey::MusicBrainzRecordingId)
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty());

    for item in tag.items() {
        let ItemKey::Unknown(key) = item.key() else {
            continue;
        };
        let (Some(name), Some(text)) = (attribute_name(key), item.value().text()) else {
            continue;
        };

        match name.to_uppercase().as_str() {
            REMOTE_ID_NAME => track.remote_id = Some(text.to_string()),
            FINGERPRINT_NAME => track.fingerprint = Some(text.to_string()),
            _ => {
                if let Ok(value) = text.trim().parse::<f64>() {
                    track.attributes.insert(name, value);
                }
            }
        }
    }

    Ok(track)
}

/// Write the track's attributes, remote id and fingerprint into its file.
///
/// Returns the number of items written.
pub fn write_attributes(track: &Track) -> Result<usize> {
    let path = track.path.as_path();
    let mut tagged_file = Probe::open(path)
        .context("Failed to open file for writing")?
        .read()
        .context("Failed to read file for tag writing")?;

    let tag_type = tagged_file.primary_tag_type();
    let mut items = Vec::new();
    if let Some(id) = &track.remote_id {
        items.push((tag_key(tag_type, REMOTE_ID_NAME)?, id.clone()));
    }
    if let Some(code) = &track.fingerprint {
        items.push((tag_key(tag_type, FINGERPRINT_NAME)?, code.clone()));
    }
    for (name, value) in &track.attributes {
        items.push((tag_key(tag_type, name)?, value.to_string()));
    }

    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .context("File has no writable tag")?;

    // Unknown keys are rejected by `insert`; `insert_unchecked` still
    // replaces items with the same key.
    let written = items.len();
    for (key, text) in items {
        tag.insert_unchecked(TagItem::new(key, ItemValue::Text(text)));
    }

    tag.save_to_path(path, WriteOptions::default())
        .context("Failed to write tags to file")?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_tag_key() {
        assert_eq!(
            tag_key(TagType::Id3v2, "energy").unwrap(),
            ItemKey::Unknown("ECHONEST_ENERGY".to_string())
        );
        assert_eq!(
            tag_key(TagType::VorbisComments, "id").unwrap(),
            ItemKey::Unknown("ECHONEST_ID".to_string())
        );
        assert_eq!(
            tag_key(TagType::Mp4Ilst, "tempo").unwrap(),
            ItemKey::Unknown("----:com.apple.iTunes:ECHONEST_TEMPO".to_string())
        );
        assert!(tag_key(TagType::Id3v1, "energy").is_err());
    }

    #[test]
    fn test_attribute_name() {
        assert_eq!(attribute_name("ECHONEST_ENERGY"), Some("energy".to_string()));
        assert_eq!(attribute_name("echonest_tempo"), Some("tempo".to_string()));
        assert_eq!(attribute_name("ECHONEST_"), None);
        assert_eq!(attribute_name("REPLAYGAIN_TRACK_GAIN"), None);
        assert_eq!(
            attribute_name("----:com.apple.iTunes:ECHONEST_VALENCE"),
            Some("valence".to_string())
        );
    }

    fn enriched(path: &Path) -> Track {
        let mut track = Track::new(path, "A", "T", 1.0);
        track.remote_id = Some("SO1".into());
        track.fingerprint = Some("eJxVl".into());
        track.attributes.insert("energy".into(), 0.5);
        track.attributes.insert("tempo".into(), 120.25);
        track
    }

    #[test]
    fn test_write_then_read_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::test_utils::write_wav(dir.path(), "tone.wav", 1);

        assert_eq!(write_attributes(&enriched(&path)).unwrap(), 4);
        let back = read_track(&path).unwrap();

        assert_eq!(back.remote_id.as_deref(), Some("SO1"));
        assert_eq!(back.fingerprint.as_deref(), Some("eJxVl"));
        assert_eq!(back.attributes.get("energy"), Some(&0.5));
        assert_eq!(back.attributes.get("tempo"), Some(&120.25));
        assert!((back.length_seconds - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_write_then_read_flac() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::test_utils::write_flac(dir.path(), "tone.flac", 2);

        assert_eq!(write_attributes(&enriched(&path)).unwrap(), 4);
        let back = read_track(&path).unwrap();

        assert_eq!(back.format, "flac");
        assert_eq!(back.remote_id.as_deref(), Some("SO1"));
        assert_eq!(back.fingerprint.as_deref(), Some("eJxVl"));
        assert_eq!(back.attributes.get("energy"), Some(&0.5));
        assert_eq!(back.attributes.get("tempo"), Some(&120.25));
    }

    #[test]
    fn test_second_write_replaces_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::test_utils::write_wav(dir.path(), "tone.wav", 1);

        write_attributes(&enriched(&path)).unwrap();
        let mut again = Track::new(&path, "A", "T", 1.0);
        again.attributes.insert("energy".into(), 0.75);
        write_attributes(&again).unwrap();

        let back = read_track(&path).unwrap();
        assert_eq!(back.attributes.get("energy"), Some(&0.75));
        assert_eq!(back.attributes.get("tempo"), Some(&120.25));
        assert_eq!(back.remote_id.as_deref(), Some("SO1"));
    }

    #[test]
    fn test_read_untagged_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::test_utils::write_wav(dir.path(), "tone.wav", 1);

        let track = read_track(&path).unwrap();

        assert_eq!(track.format, "wav");
        assert!(track.artist.is_empty());
        assert!(track.attributes.is_empty());
        assert!((track.length_seconds - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_read_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "This is just some text, not music.").expect("Failed to write to temp file");

        assert!(read_track(file.path()).is_err());
    }

    #[test]
    fn test_read_non_existent_file_returns_error() {
        assert!(read_track(Path::new("non_existent_file.mp3")).is_err());
    }

    #[test]
    fn test_write_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "Not an audio file").expect("Failed to write");

        let mut track = Track::new(file.path(), "A", "T", 1.0);
        track.attributes.insert("energy".into(), 0.5);

        assert!(write_attributes(&track).is_err());
    }
}
