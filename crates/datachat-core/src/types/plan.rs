use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered, executable plan produced from a ranked strategy list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<ExecutionPlanStep>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// One dispatchable step. `step_id` is 1-based and assigned in strategy
/// order before the plan is sorted for dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlanStep {
    pub step_id: u32,
    pub capability_id: String,
    pub parameters: Map<String, Value>,
    pub dataset_ref: String,
    pub priority: i64,
}

/// Outcome of dispatching one plan step. Failures are recorded here, never
/// propagated; the dispatcher always returns one result per step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub step_id: u32,
    pub capability_id: String,
    pub success: bool,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ExecutionResult {
    pub fn succeeded(step_id: u32, capability_id: impl Into<String>, output: Value) -> Self {
        Self {
            step_id,
            capability_id: capability_id.into(),
            success: true,
            output: Some(output),
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn failed(step_id: u32, capability_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id,
            capability_id: capability_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
