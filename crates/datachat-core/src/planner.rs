//! Strategy planning: turn an analysis request into a ranked list of
//! (capability, dataset, parameters) strategies.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::catalog::DatasetCatalog;
use crate::registry::CapabilityRegistry;
use crate::types::{AnalysisRequest, CapabilityDescriptor, DatasetDescriptor, ParamType, Strategy};

/// Capability used when a request names none.
pub const DEFAULT_CAPABILITY: &str = "data_describe";

/// Boolean parameters fanned out per (capability, dataset) pair before the
/// candidate count is capped. 4 dimensions is 16 candidates.
const MAX_BOOL_FANOUT_DIMS: usize = 4;

const COMPLEXITY_KEYWORDS: [&str; 3] = ["visualization", "machine_learning", "statistical"];

/// Enumerates and ranks candidate strategies against the shared registry
/// and catalog. Planning is pure apart from lazy capability instantiation
/// (needed for compatibility overrides).
pub struct StrategyPlanner {
    registry: Arc<CapabilityRegistry>,
    catalog: Arc<DatasetCatalog>,
}

impl StrategyPlanner {
    pub fn new(registry: Arc<CapabilityRegistry>, catalog: Arc<DatasetCatalog>) -> Self {
        Self { registry, catalog }
    }

    /// Produce up to `max_strategies` strategies, best first.
    ///
    /// Pairs scoring below `min_score` or incompatible are skipped. An empty
    /// result is a normal outcome ("no viable strategy"), not an error.
    pub fn plan(
        &self,
        request: &AnalysisRequest,
        max_strategies: usize,
        min_score: f64,
    ) -> Vec<Strategy> {
        let required: Vec<String> = if request.required_capabilities.is_empty() {
            vec![DEFAULT_CAPABILITY.to_string()]
        } else {
            request.required_capabilities.clone()
        };
        let datasets = self.catalog.list();
        let mut strategies = Vec::new();

        for (position, capability_id) in required.iter().enumerate() {
            let Some(descriptor) = self.registry.descriptor(capability_id) else {
                tracing::warn!(capability_id = %capability_id, "requested capability not registered, skipped");
                continue;
            };
            let capability = match self.registry.get(capability_id) {
                Ok(capability) => capability,
                Err(err) => {
                    tracing::warn!(capability_id = %capability_id, error = %err, "capability resolution failed, skipped");
                    continue;
                }
            };
            let intent_match = intent_match_score(&request.target_label, &descriptor);
            let order_bonus = if request.execution_order.iter().any(|id| id == capability_id) {
                (required.len() - position) as i64 * 10
            } else {
                0
            };

            for dataset in &datasets {
                let compat = capability.compatibility(&descriptor, dataset);
                if !compat.compatible || compat.score < min_score {
                    continue;
                }
                let estimated_cost = estimate_cost(&descriptor, dataset);
                for parameters in parameter_candidates(&descriptor, request, dataset) {
                    let completeness = param_completeness(&descriptor, &parameters);
                    let priority = (compat.score * 50.0).floor() as i64
                        + (intent_match * 30.0).floor() as i64
                        + (completeness * 20.0).floor() as i64
                        + order_bonus;
                    strategies.push(Strategy {
                        capability_id: capability_id.clone(),
                        dataset_name: dataset.name.clone(),
                        parameters,
                        compatibility_score: compat.score,
                        priority,
                        estimated_cost,
                    });
                }
            }
        }

        // Stable sort keeps generation order for full ties.
        strategies.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then_with(|| {
                b.compatibility_score
                    .partial_cmp(&a.compatibility_score)
                    .unwrap_or(Ordering::Equal)
            })
        });
        strategies.truncate(max_strategies);
        tracing::info!(
            strategy_count = strategies.len(),
            max_strategies,
            min_score,
            "strategy planning finished"
        );
        strategies
    }
}

/// Fraction of `target_label` whitespace tokens found in the capability's
/// name or description, case-insensitive.
fn intent_match_score(target_label: &str, descriptor: &CapabilityDescriptor) -> f64 {
    let tokens: Vec<String> = target_label
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let haystack = format!("{} {}", descriptor.name, descriptor.description).to_lowercase();
    let matched = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    (matched as f64 / tokens.len() as f64).min(1.0)
}

/// Fraction of the required parameters present in the candidate binding.
fn param_completeness(descriptor: &CapabilityDescriptor, parameters: &Map<String, Value>) -> f64 {
    let required: Vec<&str> = descriptor
        .parameter_schema
        .iter()
        .filter(|spec| spec.required)
        .map(|spec| spec.name.as_str())
        .collect();
    if required.is_empty() {
        return 1.0;
    }
    let present = required
        .iter()
        .filter(|name| parameters.contains_key(**name))
        .count();
    present as f64 / required.len() as f64
}

/// Relative cost estimate: row-count multipliers plus a surcharge per
/// complexity keyword in the capability description.
fn estimate_cost(descriptor: &CapabilityDescriptor, dataset: &DatasetDescriptor) -> f64 {
    let mut cost = 1.0;
    if dataset.approx_row_count > 1_000_000 {
        cost *= 3.0;
    } else if dataset.approx_row_count > 100_000 {
        cost *= 2.0;
    }
    let description = descriptor.description.to_lowercase();
    for keyword in COMPLEXITY_KEYWORDS {
        if description.contains(keyword) {
            cost += 0.5;
        }
    }
    cost
}

/// Build candidate parameter bindings for one (capability, dataset) pair.
///
/// The base binding is the dataset reference plus the request parameters.
/// Required parameters missing from the base are filled from their declared
/// defaults; defaultless booleans fan out into true/false variants (the only
/// candidate-multiplying dimension). Anything else still missing is left for
/// execution-time validation to reject.
fn parameter_candidates(
    descriptor: &CapabilityDescriptor,
    request: &AnalysisRequest,
    dataset: &DatasetDescriptor,
) -> Vec<Map<String, Value>> {
    let mut base = Map::new();
    base.insert("dataset_ref".to_string(), json!(dataset.name));
    for (key, value) in &request.parameters {
        base.insert(key.clone(), value.clone());
    }

    let mut candidates = vec![base];
    let mut bool_dims = 0;
    for spec in &descriptor.parameter_schema {
        if !spec.required || candidates[0].contains_key(&spec.name) {
            continue;
        }
        if let Some(default) = &spec.default_value {
            for candidate in &mut candidates {
                candidate.insert(spec.name.clone(), default.clone());
            }
        } else if spec.param_type == ParamType::Bool && bool_dims < MAX_BOOL_FANOUT_DIMS {
            bool_dims += 1;
            let mut expanded = Vec::with_capacity(candidates.len() * 2);
            for candidate in candidates {
                for flag in [true, false] {
                    let mut variant = candidate.clone();
                    variant.insert(spec.name.clone(), json!(flag));
                    expanded.push(variant);
                }
            }
            candidates = expanded;
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, CapabilityError, DataGateway, RawData, RunOutput};
    use crate::types::{DatasetKind, ParamSpec};
    use async_trait::async_trait;

    struct StubCapability {
        id: &'static str,
    }

    #[async_trait]
    impl Capability for StubCapability {
        fn id(&self) -> &str {
            self.id
        }

        async fn prepare_data(
            &self,
            _dataset: &DatasetDescriptor,
            _params: &Map<String, Value>,
            _gateway: &Arc<dyn DataGateway>,
        ) -> Result<RawData, CapabilityError> {
            Ok(RawData::default())
        }

        async fn run(
            &self,
            _data: RawData,
            _params: &Map<String, Value>,
        ) -> Result<RunOutput, CapabilityError> {
            Ok(RunOutput::default())
        }

        fn summarize(&self, _output: &RunOutput) -> String {
            String::new()
        }
    }

    fn register_stub(registry: &CapabilityRegistry, descriptor: CapabilityDescriptor) {
        let id: &'static str = Box::leak(descriptor.id.clone().into_boxed_str());
        registry.register(descriptor, Box::new(move || Arc::new(StubCapability { id })));
    }

    fn planner_fixture() -> (Arc<CapabilityRegistry>, Arc<DatasetCatalog>, StrategyPlanner) {
        let registry = Arc::new(CapabilityRegistry::new());
        let catalog = Arc::new(DatasetCatalog::new());
        let planner = StrategyPlanner::new(Arc::clone(&registry), Arc::clone(&catalog));
        (registry, catalog, planner)
    }

    fn sales_dataset() -> DatasetDescriptor {
        DatasetDescriptor::new("sales", DatasetKind::TabularFile).with_fields(vec![
            "date".into(),
            "value".into(),
            "brand".into(),
        ])
    }

    #[test]
    fn strategies_sorted_descending_and_truncated() {
        let (registry, catalog, planner) = planner_fixture();
        register_stub(
            &registry,
            CapabilityDescriptor::new("trend", "Trend Analysis")
                .with_dataset_kinds(vec![DatasetKind::TabularFile])
                .with_required_fields(vec!["date".into(), "value".into()])
                .with_optional_fields(vec!["brand".into()]),
        );
        register_stub(
            &registry,
            CapabilityDescriptor::new("describe", "Data Describe")
                .with_dataset_kinds(vec![DatasetKind::TabularFile]),
        );
        catalog.add(sales_dataset());
        catalog.add(DatasetDescriptor::new("misc", DatasetKind::TabularFile).with_fields(vec![
            "value".into(),
            "brand".into(),
        ]));

        let request = AnalysisRequest::new(vec!["trend".into(), "describe".into()])
            .with_target_label("trend analysis");
        let strategies = planner.plan(&request, 2, 0.5);

        assert_eq!(strategies.len(), 2);
        assert!(strategies[0].priority >= strategies[1].priority);
        // trend matches the label fully, so it outranks describe
        assert_eq!(strategies[0].capability_id, "trend");
        assert_eq!(strategies[0].dataset_name, "sales");
    }

    #[test]
    fn min_score_above_every_pair_yields_empty() {
        let (registry, catalog, planner) = planner_fixture();
        register_stub(
            &registry,
            CapabilityDescriptor::new("describe", "Data Describe")
                .with_dataset_kinds(vec![DatasetKind::TabularFile]),
        );
        catalog.add(sales_dataset());

        // describe has no optional fields, so every pair scores exactly 0.5
        let request = AnalysisRequest::new(vec!["describe".into()]);
        assert!(planner.plan(&request, 5, 0.9).is_empty());
    }

    #[test]
    fn empty_request_falls_back_to_default_capability() {
        let (registry, catalog, planner) = planner_fixture();
        register_stub(
            &registry,
            CapabilityDescriptor::new(DEFAULT_CAPABILITY, "Data Describe")
                .with_dataset_kinds(vec![DatasetKind::TabularFile]),
        );
        catalog.add(sales_dataset());

        let strategies = planner.plan(&AnalysisRequest::default(), 5, 0.5);
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].capability_id, DEFAULT_CAPABILITY);
    }

    #[test]
    fn unregistered_capability_is_skipped_not_fatal() {
        let (registry, catalog, planner) = planner_fixture();
        register_stub(
            &registry,
            CapabilityDescriptor::new("describe", "Data Describe")
                .with_dataset_kinds(vec![DatasetKind::TabularFile]),
        );
        catalog.add(sales_dataset());

        let request = AnalysisRequest::new(vec!["ghost".into(), "describe".into()]);
        let strategies = planner.plan(&request, 5, 0.5);
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].capability_id, "describe");
    }

    #[test]
    fn defaults_fill_required_params_and_bools_fan_out() {
        let (registry, catalog, planner) = planner_fixture();
        register_stub(
            &registry,
            CapabilityDescriptor::new("seg", "Segmenter")
                .with_dataset_kinds(vec![DatasetKind::TabularFile])
                .with_parameter_schema(vec![
                    ParamSpec::new("method", ParamType::String)
                        .required()
                        .with_default(json!("linear")),
                    ParamSpec::new("normalize", ParamType::Bool).required(),
                ]),
        );
        catalog.add(sales_dataset());

        let request = AnalysisRequest::new(vec!["seg".into()]);
        let strategies = planner.plan(&request, 10, 0.0);

        // one bool dimension with no default doubles the candidates
        assert_eq!(strategies.len(), 2);
        let flags: Vec<bool> = strategies
            .iter()
            .map(|s| s.parameters["normalize"].as_bool().unwrap())
            .collect();
        assert!(flags.contains(&true) && flags.contains(&false));
        for strategy in &strategies {
            assert_eq!(strategy.parameters["method"], json!("linear"));
            assert_eq!(strategy.parameters["dataset_ref"], json!("sales"));
        }
    }

    #[test]
    fn execution_order_bonus_lifts_listed_capability() {
        let (registry, catalog, planner) = planner_fixture();
        register_stub(
            &registry,
            CapabilityDescriptor::new("first", "Alpha")
                .with_dataset_kinds(vec![DatasetKind::TabularFile]),
        );
        register_stub(
            &registry,
            CapabilityDescriptor::new("second", "Beta")
                .with_dataset_kinds(vec![DatasetKind::TabularFile]),
        );
        catalog.add(sales_dataset());

        let request = AnalysisRequest::new(vec!["first".into(), "second".into()])
            .with_execution_order(vec!["second".into()]);
        let strategies = planner.plan(&request, 5, 0.0);

        assert_eq!(strategies[0].capability_id, "second");
        // position 1 of 2 required capabilities: (2 - 1) * 10
        assert_eq!(strategies[0].priority - strategies[1].priority, 10);
    }

    #[test]
    fn estimated_cost_scales_with_rows_and_keywords() {
        let descriptor = CapabilityDescriptor::new("ml", "Machine Learning")
            .with_description("statistical analysis with visualization output");
        let big = DatasetDescriptor::new("big", DatasetKind::ColumnarStore)
            .with_approx_row_count(2_000_000);
        let small = DatasetDescriptor::new("small", DatasetKind::ColumnarStore)
            .with_approx_row_count(10);

        assert_eq!(estimate_cost(&descriptor, &big), 4.0);
        assert_eq!(estimate_cost(&descriptor, &small), 2.0);
    }
}
