//! Trend analysis over a date-ordered numeric series.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use datachat_core::prelude::{
    Capability, CapabilityDescriptor, CapabilityError, DataGateway, DatasetDescriptor,
    DatasetKind, ParamSpec, ParamType, RawData, RunOutput,
};

use crate::util::{f64_of, int_param_or, str_of, str_param_or};

pub struct TrendAnalysisCapability;

impl TrendAnalysisCapability {
    pub const ID: &'static str = "trend_analysis";

    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new(Self::ID, "Trend Analysis")
            .with_description(
                "Detects direction and rate of change over time with linear or moving average fits, \
                 with statistical change metrics",
            )
            .with_dataset_kinds(vec![DatasetKind::TabularFile, DatasetKind::ColumnarStore])
            .with_required_fields(vec!["date".into(), "value".into()])
            .with_optional_fields(vec!["category".into()])
            .with_parameter_schema(vec![
                ParamSpec::new("date_field", ParamType::String)
                    .required()
                    .with_default(json!("date")),
                ParamSpec::new("value_field", ParamType::String)
                    .required()
                    .with_default(json!("value")),
                ParamSpec::new("category_field", ParamType::String)
                    .with_description("Optional series split field"),
                ParamSpec::new("trend_method", ParamType::String)
                    .required()
                    .with_default(json!("linear"))
                    .with_valid_values(vec![
                        json!("linear"),
                        json!("moving_average"),
                        json!("polynomial"),
                    ]),
                ParamSpec::new("window_size", ParamType::Int).with_default(json!(7)),
            ])
    }
}

#[async_trait]
impl Capability for TrendAnalysisCapability {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn prepare_data(
        &self,
        dataset: &DatasetDescriptor,
        params: &Map<String, Value>,
        gateway: &Arc<dyn DataGateway>,
    ) -> Result<RawData, CapabilityError> {
        for name in ["date_field", "value_field"] {
            let field = str_param_or(params, name, "");
            if !field.is_empty() && !dataset.fields.is_empty() && !dataset.has_field(field) {
                return Err(CapabilityError::FieldMissing {
                    dataset: dataset.name.clone(),
                    field: field.to_string(),
                });
            }
        }
        gateway.fetch(dataset).await
    }

    async fn run(
        &self,
        data: RawData,
        params: &Map<String, Value>,
    ) -> Result<RunOutput, CapabilityError> {
        let date_field = str_param_or(params, "date_field", "date");
        let value_field = str_param_or(params, "value_field", "value");
        let method = str_param_or(params, "trend_method", "linear");

        let mut points: Vec<(String, f64)> = data
            .rows
            .iter()
            .filter_map(|row| {
                let date = str_of(row, date_field)?.to_string();
                let value = f64_of(row, value_field)?;
                Some((date, value))
            })
            .collect();
        if points.len() < 2 {
            return Err(CapabilityError::Analysis(format!(
                "need at least 2 points with '{}' and '{}', got {}",
                date_field,
                value_field,
                points.len()
            )));
        }
        points.sort_by(|a, b| a.0.cmp(&b.0));

        let values: Vec<f64> = points.iter().map(|p| p.1).collect();
        let slope = linear_slope(&values);
        let first = values[0];
        let last = values[values.len() - 1];
        let change_pct = if first.abs() > f64::EPSILON {
            (last - first) / first.abs() * 100.0
        } else {
            0.0
        };
        let direction = if slope > 1e-9 {
            "up"
        } else if slope < -1e-9 {
            "down"
        } else {
            "flat"
        };

        let mut analysis = json!({
            "method": method,
            "slope": slope,
            "change_pct": change_pct,
            "direction": direction,
            "point_count": points.len(),
        });
        if method == "moving_average" {
            let window = int_param_or(params, "window_size", 7).max(1) as usize;
            analysis["moving_average"] = json!(moving_average(&values, window));
        }

        let series: Vec<Value> = points
            .iter()
            .map(|(date, value)| json!({"date": date, "value": value}))
            .collect();
        Ok(RunOutput::default()
            .with_data(series)
            .with_analysis(analysis)
            .with_visualization_hints(json!({
                "chart": "line",
                "x": date_field,
                "y": value_field,
            }))
            .with_insights(vec![format!(
                "Values trend {} with an overall change of {:.1}%.",
                direction, change_pct
            )]))
    }

    fn summarize(&self, output: &RunOutput) -> String {
        let direction = output
            .analysis
            .get("direction")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let change = output
            .analysis
            .get("change_pct")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        format!("trend is {} ({:+.1}% over the period)", direction, change)
    }
}

/// Least-squares slope of `values` against their index.
fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y: f64 = values.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den.abs() < f64::EPSILON {
        0.0
    } else {
        num / den
    }
}

fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if values.len() < window {
        return vec![values.iter().sum::<f64>() / values.len() as f64];
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}
