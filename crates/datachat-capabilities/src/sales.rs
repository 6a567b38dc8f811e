//! Sales record lookup: filter by brand, aggregate by a dimension.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use datachat_core::prelude::{
    Capability, CapabilityDescriptor, CapabilityError, DataGateway, DatasetDescriptor,
    DatasetKind, ParamSpec, ParamType, RawData, RunOutput,
};

use crate::util::{f64_of, int_param_or, key_of, str_param_or};

pub struct SalesQueryCapability;

impl SalesQueryCapability {
    pub const ID: &'static str = "sales_query";

    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new(Self::ID, "Sales Query")
            .with_description("Filters and aggregates sales records by brand, region and other dimensions")
            .with_dataset_kinds(vec![
                DatasetKind::TabularFile,
                DatasetKind::ColumnarStore,
                DatasetKind::QueryEngine,
            ])
            .with_required_fields(vec!["sales_volume".into()])
            .with_optional_fields(vec![
                "brand".into(),
                "model_name".into(),
                "region".into(),
                "fuel_type".into(),
                "body_style".into(),
            ])
            .with_parameter_schema(vec![
                ParamSpec::new("brands", ParamType::List)
                    .with_description("Restrict to these brands"),
                ParamSpec::new("group_by", ParamType::String)
                    .required()
                    .with_default(json!("brand")),
                ParamSpec::new("value_field", ParamType::String)
                    .required()
                    .with_default(json!("sales_volume")),
                ParamSpec::new("limit", ParamType::Int).with_default(json!(10)),
            ])
    }
}

#[async_trait]
impl Capability for SalesQueryCapability {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn prepare_data(
        &self,
        dataset: &DatasetDescriptor,
        params: &Map<String, Value>,
        gateway: &Arc<dyn DataGateway>,
    ) -> Result<RawData, CapabilityError> {
        let value_field = str_param_or(params, "value_field", "sales_volume");
        if !dataset.fields.is_empty() && !dataset.has_field(value_field) {
            return Err(CapabilityError::FieldMissing {
                dataset: dataset.name.clone(),
                field: value_field.to_string(),
            });
        }
        gateway.fetch(dataset).await
    }

    async fn run(
        &self,
        data: RawData,
        params: &Map<String, Value>,
    ) -> Result<RunOutput, CapabilityError> {
        let group_by = str_param_or(params, "group_by", "brand");
        let value_field = str_param_or(params, "value_field", "sales_volume");
        let limit = int_param_or(params, "limit", 10).max(1) as usize;
        let brands: Option<Vec<String>> = params.get("brands").and_then(|v| v.as_array()).map(|a| {
            a.iter()
                .filter_map(|b| b.as_str().map(str::to_lowercase))
                .collect()
        });

        // insertion-ordered grouping keeps output deterministic
        let mut groups: Vec<(String, f64, usize)> = Vec::new();
        let mut total = 0.0;
        for row in &data.rows {
            if let Some(brands) = &brands {
                let brand = key_of(row, "brand").to_lowercase();
                if !brands.contains(&brand) {
                    continue;
                }
            }
            let key = key_of(row, group_by);
            let value = f64_of(row, value_field).unwrap_or(0.0);
            total += value;
            match groups.iter_mut().find(|(k, _, _)| *k == key) {
                Some(group) => {
                    group.1 += value;
                    group.2 += 1;
                }
                None => groups.push((key, value, 1)),
            }
        }
        groups.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        groups.truncate(limit);

        let rows: Vec<Value> = groups
            .iter()
            .map(|(key, sum, count)| {
                let mut row = Map::new();
                row.insert(group_by.to_string(), json!(key));
                row.insert("total".to_string(), json!(sum));
                row.insert("records".to_string(), json!(count));
                Value::Object(row)
            })
            .collect();
        let top = groups.first().cloned();
        let mut insights = vec![format!("Aggregated {:.0} total {} by {}.", total, value_field, group_by)];
        if let Some((key, sum, _)) = &top {
            insights.push(format!("'{}' leads with {:.0}.", key, sum));
        }
        Ok(RunOutput::default()
            .with_data(rows)
            .with_analysis(json!({
                "group_by": group_by,
                "group_count": groups.len(),
                "grand_total": total,
            }))
            .with_visualization_hints(json!({"chart": "bar", "x": group_by, "y": "total"}))
            .with_insights(insights))
    }

    fn summarize(&self, output: &RunOutput) -> String {
        match output.data.first() {
            Some(top) => {
                let total = top.get("total").and_then(|v| v.as_f64()).unwrap_or(0.0);
                let label = top
                    .as_object()
                    .and_then(|o| o.values().find_map(|v| v.as_str()))
                    .unwrap_or("unknown");
                format!("top group '{}' totals {:.0}", label, total)
            }
            None => "no matching sales records".to_string(),
        }
    }
}
