//! Dataset description: structure, null counts and basic statistics.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use datachat_core::prelude::{
    score_compatibility, Capability, CapabilityDescriptor, CapabilityError, CompatibilityResult,
    DataGateway, DatasetDescriptor, DatasetKind, ParamSpec, ParamType, RawData, RunOutput,
};

use crate::util::{f64_of, int_param_or};

pub struct DataDescribeCapability;

impl DataDescribeCapability {
    pub const ID: &'static str = "data_describe";

    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new(Self::ID, "Data Describe")
            .with_description(
                "Summarizes dataset structure: fields, row count, null counts and basic statistics",
            )
            .with_dataset_kinds(vec![
                DatasetKind::TabularFile,
                DatasetKind::ColumnarStore,
                DatasetKind::QueryEngine,
            ])
            .with_parameter_schema(vec![
                ParamSpec::new("fields", ParamType::List)
                    .with_description("Restrict the description to these fields"),
                ParamSpec::new("sample_rows", ParamType::Int)
                    .with_default(json!(5))
                    .with_description("Number of sample rows to include"),
            ])
    }
}

#[async_trait]
impl Capability for DataDescribeCapability {
    fn id(&self) -> &str {
        Self::ID
    }

    /// Describing a dataset never depends on its storage family; the kind
    /// gate is skipped and only the field formula applies.
    fn compatibility(
        &self,
        descriptor: &CapabilityDescriptor,
        dataset: &DatasetDescriptor,
    ) -> CompatibilityResult {
        let mut kind_agnostic = descriptor.clone();
        kind_agnostic.supported_dataset_kinds.clear();
        score_compatibility(&kind_agnostic, dataset)
    }

    async fn prepare_data(
        &self,
        dataset: &DatasetDescriptor,
        _params: &Map<String, Value>,
        gateway: &Arc<dyn DataGateway>,
    ) -> Result<RawData, CapabilityError> {
        gateway.fetch(dataset).await
    }

    async fn run(
        &self,
        data: RawData,
        params: &Map<String, Value>,
    ) -> Result<RunOutput, CapabilityError> {
        let selected: Vec<String> = match params.get("fields").and_then(|v| v.as_array()) {
            Some(fields) => fields
                .iter()
                .filter_map(|f| f.as_str().map(ToString::to_string))
                .collect(),
            None => field_names(&data),
        };
        let row_count = data.len();
        let mut field_stats = Vec::with_capacity(selected.len());
        for field in &selected {
            let non_null = data
                .rows
                .iter()
                .filter(|row| row.get(field).map(|v| !v.is_null()).unwrap_or(false))
                .count();
            let numeric: Vec<f64> = data.rows.iter().filter_map(|row| f64_of(row, field)).collect();
            let mut stat = json!({
                "field": field,
                "non_null": non_null,
                "null_count": row_count - non_null,
            });
            if !numeric.is_empty() {
                let sum: f64 = numeric.iter().sum();
                let min = numeric.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = numeric.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                stat["min"] = json!(min);
                stat["max"] = json!(max);
                stat["mean"] = json!(sum / numeric.len() as f64);
            }
            field_stats.push(stat);
        }

        let sample_rows = int_param_or(params, "sample_rows", 5).max(0) as usize;
        let samples: Vec<Value> = data.rows.iter().take(sample_rows).cloned().collect();

        Ok(RunOutput::default()
            .with_data(samples)
            .with_analysis(json!({
                "row_count": row_count,
                "field_count": selected.len(),
                "fields": field_stats,
            }))
            .with_visualization_hints(json!({"chart": "table"}))
            .with_insights(vec![format!(
                "The dataset has {} rows across {} fields.",
                row_count,
                selected.len()
            )]))
    }

    fn summarize(&self, output: &RunOutput) -> String {
        let rows = output.analysis.get("row_count").and_then(|v| v.as_u64()).unwrap_or(0);
        let fields = output
            .analysis
            .get("field_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        format!("described {} rows across {} fields", rows, fields)
    }
}

/// Declared fields when present, otherwise the union of row keys.
fn field_names(data: &RawData) -> Vec<String> {
    if !data.fields.is_empty() {
        return data.fields.clone();
    }
    let mut names = Vec::new();
    for row in &data.rows {
        if let Some(object) = row.as_object() {
            for key in object.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }
    }
    names
}
