//! Row segmentation by parameter-selected fields.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use datachat_core::prelude::{
    Capability, CapabilityDescriptor, CapabilityError, DataGateway, DatasetDescriptor,
    DatasetKind, ParamSpec, ParamType, RawData, RunOutput,
};

use crate::util::{int_param_or, key_of};

pub struct ParamSegmenterCapability;

impl ParamSegmenterCapability {
    pub const ID: &'static str = "param_segmenter";

    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new(Self::ID, "Parameter Segmenter")
            .with_description("Splits rows into segments by field values and reports the distribution")
            .with_dataset_kinds(vec![
                DatasetKind::TabularFile,
                DatasetKind::ColumnarStore,
                DatasetKind::QueryEngine,
            ])
            .with_parameter_schema(vec![
                // no default on purpose: the caller must say how to segment
                ParamSpec::new("segment_fields", ParamType::List)
                    .required()
                    .with_description("Fields whose value combinations define the segments"),
                ParamSpec::new("filter_conditions", ParamType::Dict)
                    .with_description("Exact-match conditions applied before segmentation"),
                ParamSpec::new("top_n", ParamType::Int).with_default(json!(10)),
            ])
    }
}

#[async_trait]
impl Capability for ParamSegmenterCapability {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn prepare_data(
        &self,
        dataset: &DatasetDescriptor,
        params: &Map<String, Value>,
        gateway: &Arc<dyn DataGateway>,
    ) -> Result<RawData, CapabilityError> {
        if let Some(fields) = params.get("segment_fields").and_then(|v| v.as_array()) {
            for field in fields.iter().filter_map(|f| f.as_str()) {
                if !dataset.fields.is_empty() && !dataset.has_field(field) {
                    return Err(CapabilityError::FieldMissing {
                        dataset: dataset.name.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }
        gateway.fetch(dataset).await
    }

    async fn run(
        &self,
        data: RawData,
        params: &Map<String, Value>,
    ) -> Result<RunOutput, CapabilityError> {
        let fields: Vec<String> = params
            .get("segment_fields")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|f| f.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if fields.is_empty() {
            return Err(CapabilityError::Analysis(
                "segment_fields must name at least one field".to_string(),
            ));
        }
        let conditions = params
            .get("filter_conditions")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        let top_n = int_param_or(params, "top_n", 10).max(1) as usize;

        let mut segments: Vec<(String, usize)> = Vec::new();
        let mut matched = 0usize;
        for row in &data.rows {
            if !conditions
                .iter()
                .all(|(field, expected)| row.get(field) == Some(expected))
            {
                continue;
            }
            matched += 1;
            let key = fields
                .iter()
                .map(|f| key_of(row, f))
                .collect::<Vec<String>>()
                .join(" | ");
            match segments.iter_mut().find(|(k, _)| *k == key) {
                Some(segment) => segment.1 += 1,
                None => segments.push((key, 1)),
            }
        }
        segments.sort_by(|a, b| b.1.cmp(&a.1));
        let segment_count = segments.len();
        segments.truncate(top_n);

        let rows: Vec<Value> = segments
            .iter()
            .map(|(key, count)| {
                let share = if matched > 0 {
                    *count as f64 / matched as f64
                } else {
                    0.0
                };
                json!({"segment": key, "count": count, "share": share})
            })
            .collect();
        Ok(RunOutput::default()
            .with_data(rows)
            .with_analysis(json!({
                "segment_fields": fields,
                "segment_count": segment_count,
                "row_count": matched,
            }))
            .with_visualization_hints(json!({"chart": "pie", "label": "segment", "value": "count"}))
            .with_insights(vec![format!(
                "Found {} segments across {} matching rows.",
                segment_count, matched
            )]))
    }

    fn summarize(&self, output: &RunOutput) -> String {
        let count = output
            .analysis
            .get("segment_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        match output.data.first().and_then(|s| s.get("segment")).and_then(|v| v.as_str()) {
            Some(top) => format!("{} segments, largest is '{}'", count, top),
            None => "no segments found".to_string(),
        }
    }
}
