//! Attribute quantization and filtering.
//!
//! Acoustic attributes are continuous (`energy = 0.734`). An
//! [`AttributeMapping`] splits a `[min, max)` range into equal-width buckets,
//! one per label, so values can be shown and queried as words
//! (`energy = high`). [`MappingConfig`] decides which mapping applies to
//! which attribute, and [`AttributeFilter`] selects tracks by label or
//! threshold.

mod filter;

pub use filter::{AttributeFilter, FilterError};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Errors building an [`AttributeMapping`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error("a mapping needs at least one label")]
    NoLabels,

    #[error("invalid mapping range [{min}, {max}): max must be greater than min")]
    InvalidRange { min: f64, max: f64 },
}

/// Ordered labels over equal-width buckets of `[min, max)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMapping {
    labels: Vec<String>,
    min: f64,
    max: f64,
}

impl AttributeMapping {
    pub fn new(labels: Vec<String>, min: f64, max: f64) -> Result<Self, MappingError> {
        if labels.is_empty() {
            return Err(MappingError::NoLabels);
        }
        if !(min.is_finite() && max.is_finite() && max > min) {
            return Err(MappingError::InvalidRange { min, max });
        }
        Ok(Self { labels, min, max })
    }

    /// Mapping over `[0, 1)`, the range of most attributes.
    pub fn unit<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Result<Self, MappingError> {
        Self::new(labels.into_iter().map(Into::into).collect(), 0.0, 1.0)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Bucket index of a value, clamped to the label range. `None` for NaN.
    pub fn index(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        let n = self.labels.len();
        let width = (self.max - self.min) / n as f64;
        let bucket = ((value - self.min) / width).floor();
        Some(bucket.clamp(0.0, (n - 1) as f64) as usize)
    }

    pub fn label(&self, value: f64) -> Option<&str> {
        self.index(value).map(|i| self.labels[i].as_str())
    }

    /// Position of a label, compared case-insensitively.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(label))
    }
}

/// Label for an optional value. Absent or NaN values have no label.
pub fn map(value: Option<f64>, mapping: &AttributeMapping) -> Option<&str> {
    value.and_then(|v| mapping.label(v))
}

/// Which mapping applies to each attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Labels for attributes without an override
    pub default_labels: Vec<String>,

    /// Attributes shown as plain numbers
    pub no_mapping: Vec<String>,

    /// Per-attribute label overrides
    pub labels: BTreeMap<String, Vec<String>>,

    /// Per-attribute `[min, max]` ranges (default `[0, 1]`)
    pub ranges: BTreeMap<String, [f64; 2]>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        let labels = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            default_labels: labels(&["very low", "low", "neutral", "high", "very high"]),
            no_mapping: labels(&["tempo", "loudness", "duration"]),
            labels: BTreeMap::from([
                (
                    "speechiness".to_string(),
                    labels(&["singing", "rapping", "speaking"]),
                ),
                (
                    "danceability".to_string(),
                    labels(&["bed", "couch", "party", "disco"]),
                ),
            ]),
            ranges: BTreeMap::new(),
        }
    }
}

/// Entry for `attribute` in a per-attribute table, ignoring ASCII case.
fn lookup<'a, V>(table: &'a BTreeMap<String, V>, attribute: &str) -> Option<&'a V> {
    table.get(attribute).or_else(|| {
        table
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, value)| value)
    })
}

impl MappingConfig {
    /// The mapping for an attribute, or `None` if it is shown unmapped.
    ///
    /// Attribute names match regardless of case in every table.
    pub fn mapping_for(&self, attribute: &str) -> Result<Option<AttributeMapping>, MappingError> {
        if self.no_mapping.iter().any(|a| a.eq_ignore_ascii_case(attribute)) {
            return Ok(None);
        }

        let labels = lookup(&self.labels, attribute)
            .unwrap_or(&self.default_labels)
            .clone();
        let [min, max] = lookup(&self.ranges, attribute)
            .copied()
            .unwrap_or([0.0, 1.0]);

        AttributeMapping::new(labels, min, max).map(Some)
    }

    /// Human-readable value: the label if mapped, else the number.
    pub fn display(&self, attribute: &str, value: Option<f64>) -> String {
        let Some(value) = value else {
            return "not set".to_string();
        };
        match self.mapping_for(attribute) {
            Ok(Some(mapping)) => mapping
                .label(value)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
            Ok(None) => format!("{:.2}", value),
            Err(e) => {
                tracing::warn!("echonest: invalid mapping for {}: {}", attribute, e);
                format!("{:.2}", value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn low_mid_high() -> AttributeMapping {
        AttributeMapping::unit(["low", "mid", "high"]).unwrap()
    }

    #[test]
    fn test_map_buckets() {
        let mapping = low_mid_high();
        assert_eq!(map(Some(0.34), &mapping), Some("mid"));
        assert_eq!(map(Some(0.999), &mapping), Some("high"));
        assert_eq!(map(Some(-0.1), &mapping), Some("low"));
        assert_eq!(map(Some(0.0), &mapping), Some("low"));
    }

    #[test]
    fn test_map_clamps_at_and_above_max() {
        let mapping = low_mid_high();
        assert_eq!(map(Some(1.0), &mapping), Some("high"));
        assert_eq!(map(Some(7.5), &mapping), Some("high"));
        assert_eq!(map(Some(f64::INFINITY), &mapping), Some("high"));
        assert_eq!(map(Some(f64::NEG_INFINITY), &mapping), Some("low"));
    }

    #[test]
    fn test_map_absent_or_nan() {
        let mapping = low_mid_high();
        assert_eq!(map(None, &mapping), None);
        assert_eq!(map(Some(f64::NAN), &mapping), None);
    }

    #[test]
    fn test_custom_range() {
        let mapping =
            AttributeMapping::new(vec!["slow".into(), "fast".into()], 60.0, 180.0).unwrap();
        assert_eq!(mapping.label(90.0), Some("slow"));
        assert_eq!(mapping.label(120.0), Some("fast"));
    }

    #[test]
    fn test_invalid_mappings() {
        assert_eq!(
            AttributeMapping::new(vec![], 0.0, 1.0),
            Err(MappingError::NoLabels)
        );
        assert!(matches!(
            AttributeMapping::new(vec!["a".into()], 1.0, 1.0),
            Err(MappingError::InvalidRange { .. })
        ));
        assert!(matches!(
            AttributeMapping::new(vec!["a".into()], 0.0, f64::NAN),
            Err(MappingError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_mapping_config_resolution() {
        let config = MappingConfig::default();

        assert_eq!(config.mapping_for("tempo").unwrap(), None);

        let speech = config.mapping_for("speechiness").unwrap().unwrap();
        assert_eq!(speech.labels(), &["singing", "rapping", "speaking"]);

        let energy = config.mapping_for("energy").unwrap().unwrap();
        assert_eq!(energy.labels().len(), 5);
        assert_eq!(energy.range(), (0.0, 1.0));
        assert_eq!(energy.label(0.5), Some("neutral"));
    }

    #[test]
    fn test_mapping_config_range_override() {
        let mut config = MappingConfig::default();
        config.ranges.insert("valence".into(), [0.0, 2.0]);
        let valence = config.mapping_for("valence").unwrap().unwrap();
        assert_eq!(valence.label(0.5), Some("low"));

        config.ranges.insert("energy".into(), [1.0, 0.0]);
        assert!(config.mapping_for("energy").is_err());
    }

    #[test]
    fn test_mapping_config_ignores_case() {
        let mut config = MappingConfig::default();
        config.labels.insert("Mood".into(), vec!["sad".into(), "happy".into()]);
        config.ranges.insert("LIVENESS".into(), [0.0, 2.0]);

        let mood = config.mapping_for("mood").unwrap().unwrap();
        assert_eq!(mood.labels(), &["sad", "happy"]);
        let speech = config.mapping_for("SpeechIness").unwrap().unwrap();
        assert_eq!(speech.labels(), &["singing", "rapping", "speaking"]);
        let liveness = config.mapping_for("liveness").unwrap().unwrap();
        assert_eq!(liveness.range(), (0.0, 2.0));
        assert_eq!(config.mapping_for("TEMPO").unwrap(), None);
    }

    #[test]
    fn test_display() {
        let config = MappingConfig::default();
        assert_eq!(config.display("danceability", Some(0.9)), "disco");
        assert_eq!(config.display("tempo", Some(121.456)), "121.46");
        assert_eq!(config.display("energy", None), "not set");
    }

    proptest! {
        #[test]
        fn prop_index_always_in_range(value in proptest::num::f64::ANY, n in 1usize..10) {
            let labels: Vec<String> = (0..n).map(|i| i.to_string()).collect();
            let mapping = AttributeMapping::new(labels, 0.0, 1.0).unwrap();
            match mapping.index(value) {
                Some(i) => prop_assert!(i < n),
                None => prop_assert!(value.is_nan()),
            }
        }

        #[test]
        fn prop_index_is_monotonic(a in -2.0f64..2.0, b in -2.0f64..2.0) {
            let mapping = AttributeMapping::unit(["a", "b", "c", "d", "e"]).unwrap();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(mapping.index(lo) <= mapping.index(hi));
        }
    }
}
