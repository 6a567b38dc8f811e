//! Execution planning and dispatch.
//!
//! `build_plan` freezes ranked strategies into numbered steps; the
//! `Dispatcher` runs them sequentially, recording one result per step no
//! matter what fails along the way.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::capability::{CapabilityError, DataGateway};
use crate::catalog::DatasetCatalog;
use crate::registry::{CapabilityRegistry, RegistryError};
use crate::types::{
    CapabilityDescriptor, ExecutionPlan, ExecutionPlanStep, ExecutionResult, Strategy,
};

/// Per-step dispatch failures. These are recorded on the step result,
/// never propagated out of `execute`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("dataset '{0}' not found")]
    DatasetNotFound(String),
    #[error("parameter validation failed: {0}")]
    ParameterValidation(String),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// Build an executable plan from ranked strategies.
///
/// Strategies whose capability id is no longer registered are dropped.
/// Step ids are 1-based in strategy order; the plan is then stable-sorted
/// ascending by priority, which is the dispatch order.
pub fn build_plan(registry: &CapabilityRegistry, strategies: &[Strategy]) -> ExecutionPlan {
    let mut steps: Vec<ExecutionPlanStep> = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        if !registry.contains(&strategy.capability_id) {
            tracing::warn!(
                capability_id = %strategy.capability_id,
                "strategy references unregistered capability, dropped from plan"
            );
            continue;
        }
        steps.push(ExecutionPlanStep {
            step_id: steps.len() as u32 + 1,
            capability_id: strategy.capability_id.clone(),
            parameters: strategy.parameters.clone(),
            dataset_ref: strategy.dataset_name.clone(),
            priority: strategy.priority,
        });
    }
    steps.sort_by_key(|step| step.priority);
    ExecutionPlan { steps }
}

/// Apply defaults and check a step's parameters against the descriptor's
/// schema. Unknown keys pass through untouched.
pub fn validate_parameters(
    descriptor: &CapabilityDescriptor,
    parameters: &Map<String, Value>,
) -> Result<Map<String, Value>, DispatchError> {
    let mut validated = parameters.clone();
    for spec in &descriptor.parameter_schema {
        let value = match validated.get(&spec.name) {
            Some(value) => value.clone(),
            None => match &spec.default_value {
                Some(default) => {
                    validated.insert(spec.name.clone(), default.clone());
                    default.clone()
                }
                None if spec.required => {
                    return Err(DispatchError::ParameterValidation(format!(
                        "missing required parameter '{}'",
                        spec.name
                    )));
                }
                None => continue,
            },
        };
        if !spec.param_type.accepts(&value) {
            return Err(DispatchError::ParameterValidation(format!(
                "parameter '{}' has wrong type, expected {:?}",
                spec.name, spec.param_type
            )));
        }
        if let Some(valid) = &spec.valid_values {
            if !valid.contains(&value) {
                return Err(DispatchError::ParameterValidation(format!(
                    "parameter '{}' value {} not in allowed set",
                    spec.name, value
                )));
            }
        }
    }
    Ok(validated)
}

/// Sequential plan dispatcher over the shared registry, catalog and gateway.
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    catalog: Arc<DatasetCatalog>,
    gateway: Arc<dyn DataGateway>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        catalog: Arc<DatasetCatalog>,
        gateway: Arc<dyn DataGateway>,
    ) -> Self {
        Self {
            registry,
            catalog,
            gateway,
        }
    }

    /// Execute every step, returning exactly one result per step in step-id
    /// order. Failures are recorded and execution continues; a cancelled
    /// token marks the remaining steps as failed without running them.
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        cancel: &CancellationToken,
    ) -> Vec<ExecutionResult> {
        let mut results: Vec<ExecutionResult> = Vec::with_capacity(plan.len());
        for step in &plan.steps {
            if cancel.is_cancelled() {
                tracing::warn!(step_id = step.step_id, "step skipped, execution cancelled");
                results.push(ExecutionResult::failed(
                    step.step_id,
                    step.capability_id.clone(),
                    "execution cancelled",
                ));
                continue;
            }
            tracing::info!(
                step_id = step.step_id,
                capability_id = %step.capability_id,
                dataset_ref = %step.dataset_ref,
                "step execution started"
            );
            let started = Instant::now();
            let result = match self.run_step(step).await {
                Ok((output, summary)) => {
                    ExecutionResult::succeeded(step.step_id, step.capability_id.clone(), output)
                        .with_metadata("summary", json!(summary))
                }
                Err(err) => {
                    tracing::warn!(
                        step_id = step.step_id,
                        capability_id = %step.capability_id,
                        error = %err,
                        "step execution failed"
                    );
                    ExecutionResult::failed(step.step_id, step.capability_id.clone(), err.to_string())
                }
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;
            results.push(result.with_metadata("elapsed_ms", json!(elapsed_ms)));
            tracing::info!(
                step_id = step.step_id,
                capability_id = %step.capability_id,
                elapsed_ms,
                "step execution finished"
            );
        }
        results.sort_by_key(|r| r.step_id);
        results
    }

    async fn run_step(&self, step: &ExecutionPlanStep) -> Result<(Value, String), DispatchError> {
        let descriptor = self
            .registry
            .descriptor(&step.capability_id)
            .ok_or_else(|| RegistryError::CapabilityNotFound(step.capability_id.clone()))?;
        let capability = self.registry.get(&step.capability_id)?;
        let parameters = validate_parameters(&descriptor, &step.parameters)?;
        let dataset = self
            .catalog
            .get(&step.dataset_ref)
            .ok_or_else(|| DispatchError::DatasetNotFound(step.dataset_ref.clone()))?;
        let data = capability
            .prepare_data(&dataset, &parameters, &self.gateway)
            .await?;
        let output = capability.run(data, &parameters).await?;
        let summary = capability.summarize(&output);
        Ok((json!(output), summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, InMemoryGateway, RawData, RunOutput};
    use crate::types::{DatasetDescriptor, DatasetKind, ParamSpec, ParamType};
    use async_trait::async_trait;

    struct FlakyCapability {
        id: &'static str,
    }

    #[async_trait]
    impl Capability for FlakyCapability {
        fn id(&self) -> &str {
            self.id
        }

        async fn prepare_data(
            &self,
            dataset: &DatasetDescriptor,
            _params: &Map<String, Value>,
            gateway: &Arc<dyn DataGateway>,
        ) -> Result<RawData, CapabilityError> {
            if dataset.name == "broken" {
                return Err(CapabilityError::DataAccess("connection refused".into()));
            }
            gateway.fetch(dataset).await
        }

        async fn run(
            &self,
            data: RawData,
            _params: &Map<String, Value>,
        ) -> Result<RunOutput, CapabilityError> {
            Ok(RunOutput::default()
                .with_data(data.rows)
                .with_insights(vec!["ran".into()]))
        }

        fn summarize(&self, output: &RunOutput) -> String {
            format!("{} rows", output.data.len())
        }
    }

    fn fixture() -> (Arc<CapabilityRegistry>, Arc<DatasetCatalog>, Dispatcher) {
        let registry = Arc::new(CapabilityRegistry::new());
        let catalog = Arc::new(DatasetCatalog::new());
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.insert_table("sales", vec![json!({"v": 1}), json!({"v": 2})]);
        catalog.add(DatasetDescriptor::new("sales", DatasetKind::TabularFile));
        catalog.add(DatasetDescriptor::new("broken", DatasetKind::TabularFile));
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&catalog), gateway);
        (registry, catalog, dispatcher)
    }

    fn register_flaky(registry: &CapabilityRegistry, id: &'static str) {
        registry.register(
            CapabilityDescriptor::new(id, id),
            Box::new(move || Arc::new(FlakyCapability { id })),
        );
    }

    fn strategy(capability_id: &str, dataset: &str, priority: i64) -> Strategy {
        Strategy {
            capability_id: capability_id.into(),
            dataset_name: dataset.into(),
            parameters: Map::new(),
            compatibility_score: 0.5,
            priority,
            estimated_cost: 1.0,
        }
    }

    #[test]
    fn plan_is_priority_ascending_with_one_based_ids() {
        let (registry, _catalog, _dispatcher) = fixture();
        register_flaky(&registry, "cap");
        let strategies = vec![
            strategy("cap", "sales", 90),
            strategy("cap", "sales", 40),
            strategy("ghost", "sales", 70),
            strategy("cap", "sales", 60),
        ];

        let plan = build_plan(&registry, &strategies);
        assert_eq!(plan.len(), 3);
        let priorities: Vec<i64> = plan.steps.iter().map(|s| s.priority).collect();
        assert_eq!(priorities, vec![40, 60, 90]);
        // ids were assigned before the sort, in strategy order
        let ids: Vec<u32> = plan.steps.iter().map(|s| s.step_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn failed_step_recorded_others_run_independently() {
        tokio_test::block_on(async {
            let (registry, _catalog, dispatcher) = fixture();
            register_flaky(&registry, "cap");
            let strategies = vec![
                strategy("cap", "sales", 10),
                strategy("cap", "broken", 20),
                strategy("cap", "sales", 30),
            ];
            let plan = build_plan(&registry, &strategies);

            let results = dispatcher.execute(&plan, &CancellationToken::new()).await;
            assert_eq!(results.len(), 3);
            let by_step: Vec<u32> = results.iter().map(|r| r.step_id).collect();
            assert_eq!(by_step, vec![1, 2, 3]);
            assert!(results[0].success);
            assert!(!results[1].success);
            assert!(results[1].error.as_deref().unwrap().contains("connection refused"));
            assert!(results[2].success);
            assert_eq!(results[0].metadata["summary"], json!("2 rows"));
            assert!(results[0].metadata.contains_key("elapsed_ms"));
        });
    }

    #[test]
    fn unknown_dataset_and_capability_are_per_step_failures() {
        tokio_test::block_on(async {
            let (registry, _catalog, dispatcher) = fixture();
            register_flaky(&registry, "cap");
            let plan = ExecutionPlan {
                steps: vec![
                    ExecutionPlanStep {
                        step_id: 1,
                        capability_id: "ghost".into(),
                        parameters: Map::new(),
                        dataset_ref: "sales".into(),
                        priority: 0,
                    },
                    ExecutionPlanStep {
                        step_id: 2,
                        capability_id: "cap".into(),
                        parameters: Map::new(),
                        dataset_ref: "nowhere".into(),
                        priority: 0,
                    },
                ],
            };

            let results = dispatcher.execute(&plan, &CancellationToken::new()).await;
            assert_eq!(results.len(), 2);
            assert!(results[0].error.as_deref().unwrap().contains("ghost"));
            assert!(results[1].error.as_deref().unwrap().contains("nowhere"));
        });
    }

    #[test]
    fn cancelled_token_marks_steps_failed_without_running() {
        tokio_test::block_on(async {
            let (registry, _catalog, dispatcher) = fixture();
            register_flaky(&registry, "cap");
            let plan = build_plan(&registry, &[strategy("cap", "sales", 1)]);
            let cancel = CancellationToken::new();
            cancel.cancel();

            let results = dispatcher.execute(&plan, &cancel).await;
            assert_eq!(results.len(), 1);
            assert!(!results[0].success);
            assert!(results[0].error.as_deref().unwrap().contains("cancelled"));
        });
    }

    #[test]
    fn validation_applies_defaults_and_rejects_bad_values() {
        let descriptor = CapabilityDescriptor::new("cap", "Cap").with_parameter_schema(vec![
            ParamSpec::new("method", ParamType::String)
                .required()
                .with_default(json!("linear"))
                .with_valid_values(vec![json!("linear"), json!("polynomial")]),
            ParamSpec::new("window", ParamType::Int).with_default(json!(7)),
            ParamSpec::new("fields", ParamType::List).required(),
        ]);

        let mut params = Map::new();
        params.insert("fields".into(), json!(["brand"]));
        let validated = validate_parameters(&descriptor, &params).unwrap();
        assert_eq!(validated["method"], json!("linear"));
        assert_eq!(validated["window"], json!(7));

        let empty = Map::new();
        let err = validate_parameters(&descriptor, &empty).unwrap_err();
        assert!(err.to_string().contains("fields"));

        let mut bad = Map::new();
        bad.insert("fields".into(), json!(["brand"]));
        bad.insert("method".into(), json!("cubic"));
        let err = validate_parameters(&descriptor, &bad).unwrap_err();
        assert!(err.to_string().contains("allowed set"));

        let mut wrong_type = Map::new();
        wrong_type.insert("fields".into(), json!("brand"));
        let err = validate_parameters(&descriptor, &wrong_type).unwrap_err();
        assert!(err.to_string().contains("wrong type"));
    }
}
