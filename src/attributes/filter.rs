//! Track filters over acoustic attributes.
//!
//! Syntax:
//! - `energy:high,very high`: the mapped label is one of the listed labels
//! - `tempo:>120`: the raw value is greater than 120
//! - `valence:<0.3`: the raw value is less than 0.3

use super::{AttributeMapping, MappingConfig, MappingError};
use crate::model::Track;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("invalid filter '{0}': expected name:label[,label...], name:>value or name:<value")]
    Syntax(String),

    #[error("invalid number '{value}' in filter on {attribute}")]
    InvalidNumber { attribute: String, value: String },

    #[error("{0} has no label mapping; filter it with > or <")]
    Unmapped(String),

    #[error("unknown label '{label}' for {attribute} (known: {known})")]
    UnknownLabel {
        attribute: String,
        label: String,
        known: String,
    },

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// A condition a track's attribute must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeFilter {
    OneOf {
        attribute: String,
        labels: Vec<String>,
        mapping: AttributeMapping,
    },
    GreaterThan {
        attribute: String,
        value: f64,
    },
    LessThan {
        attribute: String,
        value: f64,
    },
}

impl AttributeFilter {
    /// Parse a filter expression, resolving label filters against `mappings`.
    pub fn parse(expr: &str, mappings: &MappingConfig) -> Result<Self, FilterError> {
        let (name, condition) = expr
            .split_once(':')
            .ok_or_else(|| FilterError::Syntax(expr.to_string()))?;
        let attribute = name.trim().to_lowercase();
        let condition = condition.trim();
        if attribute.is_empty() || condition.is_empty() {
            return Err(FilterError::Syntax(expr.to_string()));
        }

        let number = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| !v.is_nan())
                .ok_or_else(|| FilterError::InvalidNumber {
                    attribute: attribute.clone(),
                    value: raw.trim().to_string(),
                })
        };

        if let Some(raw) = condition.strip_prefix('>') {
            let value = number(raw)?;
            return Ok(Self::GreaterThan { attribute, value });
        }
        if let Some(raw) = condition.strip_prefix('<') {
            let value = number(raw)?;
            return Ok(Self::LessThan { attribute, value });
        }

        let mapping = mappings
            .mapping_for(&attribute)?
            .ok_or_else(|| FilterError::Unmapped(attribute.clone()))?;

        let mut labels = Vec::new();
        for label in condition.split(',').map(str::trim).filter(|l| !l.is_empty()) {
            let Some(position) = mapping.position(label) else {
                return Err(FilterError::UnknownLabel {
                    attribute,
                    label: label.to_string(),
                    known: mapping.labels().join(", "),
                });
            };
            labels.push(mapping.labels()[position].clone());
        }
        if labels.is_empty() {
            return Err(FilterError::Syntax(expr.to_string()));
        }

        Ok(Self::OneOf {
            attribute,
            labels,
            mapping,
        })
    }

    pub fn attribute(&self) -> &str {
        match self {
            Self::OneOf { attribute, .. }
            | Self::GreaterThan { attribute, .. }
            | Self::LessThan { attribute, .. } => attribute,
        }
    }

    /// Whether the track satisfies the filter. A missing attribute never does.
    pub fn matches(&self, track: &Track) -> bool {
        let Some(value) = track.attribute(self.attribute()) else {
            return false;
        };
        match self {
            Self::OneOf {
                labels, mapping, ..
            } => mapping
                .label(value)
                .is_some_and(|label| labels.iter().any(|l| l == label)),
            Self::GreaterThan { value: bound, .. } => value > *bound,
            Self::LessThan { value: bound, .. } => value < *bound,
        }
    }
}
