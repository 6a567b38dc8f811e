//! Capability/dataset compatibility scoring.
//!
//! The score is a contract: incompatible pairs are exactly 0.0, compatible
//! pairs start at 0.5 and earn up to 0.5 more linearly with optional-field
//! coverage. Planners compare these scores across capabilities, so the shape
//! of the curve matters more than its absolute meaning.

use serde::{Deserialize, Serialize};

use crate::types::{CapabilityDescriptor, DatasetDescriptor};

/// Result of checking one capability against one dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompatibilityResult {
    pub compatible: bool,
    /// In [0, 1]; exactly 0.0 when incompatible.
    pub score: f64,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

impl CompatibilityResult {
    pub fn incompatible(reason: impl Into<String>, missing_fields: Vec<String>) -> Self {
        Self {
            compatible: false,
            score: 0.0,
            missing_fields,
            reason: reason.into(),
        }
    }

    pub fn compatible(score: f64) -> Self {
        Self {
            compatible: true,
            score: score.clamp(0.0, 1.0),
            missing_fields: Vec::new(),
            reason: String::new(),
        }
    }
}

/// Score `descriptor` against `dataset`.
///
/// Dataset kind gates first, then required fields; both produce an
/// incompatible result with score 0.0. Otherwise the score is
/// `0.5 + 0.5 * matched_optional / max(optional_count, 1)`, clamped to [0, 1].
pub fn score_compatibility(
    descriptor: &CapabilityDescriptor,
    dataset: &DatasetDescriptor,
) -> CompatibilityResult {
    if !descriptor.supported_dataset_kinds.is_empty()
        && !descriptor.supported_dataset_kinds.contains(&dataset.kind)
    {
        return CompatibilityResult::incompatible(
            format!("dataset kind {} not supported", dataset.kind),
            Vec::new(),
        );
    }

    let missing: Vec<String> = descriptor
        .required_fields
        .iter()
        .filter(|f| !dataset.has_field(f))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return CompatibilityResult::incompatible(
            format!("missing required fields: {}", missing.join(", ")),
            missing,
        );
    }

    let optional_total = descriptor.optional_fields.len().max(1);
    let matched = descriptor
        .optional_fields
        .iter()
        .filter(|f| dataset.has_field(f))
        .count();
    let score = 0.5 + 0.5 * (matched as f64 / optional_total as f64);
    CompatibilityResult::compatible(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DatasetKind;

    fn dataset(fields: &[&str]) -> DatasetDescriptor {
        DatasetDescriptor::new("sales", DatasetKind::TabularFile)
            .with_fields(fields.iter().map(|f| f.to_string()).collect())
    }

    #[test]
    fn full_optional_coverage_scores_one() {
        let descriptor = CapabilityDescriptor::new("describe", "Data Describe")
            .with_dataset_kinds(vec![DatasetKind::TabularFile])
            .with_optional_fields(vec!["a".into(), "b".into()]);
        let result = score_compatibility(&descriptor, &dataset(&["a", "b"]));
        assert!(result.compatible);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn no_optional_fields_scores_floor() {
        let descriptor = CapabilityDescriptor::new("describe", "Data Describe")
            .with_dataset_kinds(vec![DatasetKind::TabularFile]);
        let result = score_compatibility(&descriptor, &dataset(&["a"]));
        assert_eq!(result.score, 0.5);
    }

    #[test]
    fn missing_required_field_is_zero_and_incompatible() {
        let descriptor = CapabilityDescriptor::new("trend", "Trend Analysis")
            .with_dataset_kinds(vec![DatasetKind::TabularFile])
            .with_required_fields(vec!["date".into(), "value".into()]);
        let result = score_compatibility(&descriptor, &dataset(&["date"]));
        assert!(!result.compatible);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.missing_fields, vec!["value".to_string()]);
    }

    #[test]
    fn unsupported_kind_is_zero_with_reason() {
        let descriptor = CapabilityDescriptor::new("trend", "Trend Analysis")
            .with_dataset_kinds(vec![DatasetKind::QueryEngine]);
        let result = score_compatibility(&descriptor, &dataset(&["date"]));
        assert!(!result.compatible);
        assert_eq!(result.score, 0.0);
        assert!(result.reason.contains("tabular_file"));
    }

    #[test]
    fn partial_optional_coverage_is_linear() {
        let descriptor = CapabilityDescriptor::new("yoy", "Year over Year")
            .with_dataset_kinds(vec![DatasetKind::TabularFile])
            .with_optional_fields(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        let result = score_compatibility(&descriptor, &dataset(&["a", "c"]));
        assert_eq!(result.score, 0.75);
    }
}
