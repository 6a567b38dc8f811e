//! Year-over-year comparison of an aggregated value series.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use datachat_core::prelude::{
    Capability, CapabilityDescriptor, CapabilityError, DataGateway, DatasetDescriptor,
    DatasetKind, ParamSpec, ParamType, RawData, RunOutput,
};

use crate::util::{f64_of, str_of, str_param_or};

pub struct YoyComparisonCapability;

impl YoyComparisonCapability {
    pub const ID: &'static str = "yoy_comparison";

    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new(Self::ID, "Year over Year Comparison")
            .with_description(
                "Aggregates a value per year and reports statistical growth between periods",
            )
            .with_dataset_kinds(vec![DatasetKind::TabularFile, DatasetKind::ColumnarStore])
            .with_required_fields(vec!["date".into(), "value".into()])
            .with_optional_fields(vec!["category".into(), "region".into()])
            .with_parameter_schema(vec![
                ParamSpec::new("date_field", ParamType::String)
                    .required()
                    .with_default(json!("date")),
                ParamSpec::new("value_field", ParamType::String)
                    .required()
                    .with_default(json!("value")),
                ParamSpec::new("aggregation_method", ParamType::String)
                    .required()
                    .with_default(json!("sum"))
                    .with_valid_values(vec![json!("sum"), json!("mean"), json!("count")]),
                ParamSpec::new("comparison_periods", ParamType::Int).with_default(json!(1)),
            ])
    }
}

#[async_trait]
impl Capability for YoyComparisonCapability {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn prepare_data(
        &self,
        dataset: &DatasetDescriptor,
        params: &Map<String, Value>,
        gateway: &Arc<dyn DataGateway>,
    ) -> Result<RawData, CapabilityError> {
        let date_field = str_param_or(params, "date_field", "date");
        if !dataset.fields.is_empty() && !dataset.has_field(date_field) {
            return Err(CapabilityError::FieldMissing {
                dataset: dataset.name.clone(),
                field: date_field.to_string(),
            });
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
        let method = str_param_or(params, "aggregation_method", "sum");

        // (sum, count) per year, year taken from the date prefix
        let mut buckets: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for row in &data.rows {
            let Some(year) = str_of(row, date_field).and_then(parse_year) else {
                continue;
            };
            let value = f64_of(row, value_field).unwrap_or(0.0);
            let bucket = buckets.entry(year).or_insert((0.0, 0));
            bucket.0 += value;
            bucket.1 += 1;
        }
        if buckets.len() < 2 {
            return Err(CapabilityError::Analysis(format!(
                "year-over-year comparison needs at least 2 years, got {}",
                buckets.len()
            )));
        }

        let yearly: Vec<(u32, f64)> = buckets
            .iter()
            .map(|(year, (sum, count))| {
                let aggregated = match method {
                    "mean" => sum / *count as f64,
                    "count" => *count as f64,
                    _ => *sum,
                };
                (*year, aggregated)
            })
            .collect();

        let mut changes = Vec::new();
        for pair in yearly.windows(2) {
            let (prev_year, prev) = pair[0];
            let (year, current) = pair[1];
            let change_pct = if prev.abs() > f64::EPSILON {
                (current - prev) / prev.abs() * 100.0
            } else {
                0.0
            };
            changes.push(json!({
                "from": prev_year,
                "to": year,
                "change_pct": change_pct,
            }));
        }

        let latest_change = changes
            .last()
            .and_then(|c| c["change_pct"].as_f64())
            .unwrap_or(0.0);
        let data_rows: Vec<Value> = yearly
            .iter()
            .map(|(year, value)| json!({"year": year, "value": value}))
            .collect();
        Ok(RunOutput::default()
            .with_data(data_rows)
            .with_analysis(json!({
                "aggregation_method": method,
                "years": yearly.iter().map(|(y, _)| *y).collect::<Vec<u32>>(),
                "changes": changes,
                "latest_change_pct": latest_change,
            }))
            .with_visualization_hints(json!({"chart": "bar", "x": "year", "y": "value"}))
            .with_insights(vec![format!(
                "Latest year changed by {:+.1}% against the previous year.",
                latest_change
            )]))
    }

    fn summarize(&self, output: &RunOutput) -> String {
        let change = output
            .analysis
            .get("latest_change_pct")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        format!("latest year-over-year change is {:+.1}%", change)
    }
}

/// Year from a `YYYY`-prefixed date string.
fn parse_year(date: &str) -> Option<u32> {
    let prefix: String = date.chars().take(4).collect();
    prefix.parse().ok().filter(|y| (1000..=9999).contains(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_years() -> Vec<Value> {
        vec![
            json!({"date": "2023-01", "value": 100}),
            json!({"date": "2023-06", "value": 100}),
            json!({"date": "2024-01", "value": 150}),
            json!({"date": "2024-06", "value": 150}),
        ]
    }

    #[test]
    fn sums_per_year_and_reports_change() {
        tokio_test::block_on(async {
            let capability = YoyComparisonCapability;
            let data = RawData::new(two_years(), vec![]);
            let output = capability.run(data, &Map::new()).await.unwrap();

            assert_eq!(output.data[0], json!({"year": 2023, "value": 200.0}));
            assert_eq!(output.data[1], json!({"year": 2024, "value": 300.0}));
            assert_eq!(output.analysis["latest_change_pct"], json!(50.0));
            assert_eq!(capability.summarize(&output), "latest year-over-year change is +50.0%");
        });
    }

    #[test]
    fn mean_aggregation_divides_by_count() {
        tokio_test::block_on(async {
            let capability = YoyComparisonCapability;
            let mut params = Map::new();
            params.insert("aggregation_method".into(), json!("mean"));
            let output = capability
                .run(RawData::new(two_years(), vec![]), &params)
                .await
                .unwrap();
            assert_eq!(output.data[0], json!({"year": 2023, "value": 100.0}));
        });
    }

    #[test]
    fn single_year_is_an_analysis_error() {
        tokio_test::block_on(async {
            let capability = YoyComparisonCapability;
            let data = RawData::new(vec![json!({"date": "2024-01", "value": 1})], vec![]);
            let err = capability.run(data, &Map::new()).await.unwrap_err();
            assert!(matches!(err, CapabilityError::Analysis(_)));
        });
    }

    #[test]
    fn year_prefix_parsing_rejects_garbage() {
        assert_eq!(parse_year("2024-05-01"), Some(2024));
        assert_eq!(parse_year("n/a"), None);
        assert_eq!(parse_year("99"), None);
    }
}
