use serde::{Deserialize, Serialize};

use super::intent::ClassifiedIntent;
use super::plan::{ExecutionPlan, ExecutionResult};
use super::strategy::Strategy;

/// The single mutable record threaded through every workflow stage.
///
/// Stage handlers read and write this; the routers only read it. Re-entering
/// the strategy stage after feedback clears the per-round fields
/// (`execution_results`, `summary`) while `request_text` survives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    pub request_text: String,
    #[serde(default)]
    pub intent: Option<ClassifiedIntent>,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
    #[serde(default)]
    pub execution_plan: ExecutionPlan,
    #[serde(default)]
    pub execution_results: Vec<ExecutionResult>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub final_response: Option<String>,
    #[serde(default)]
    pub user_feedback: Option<String>,
    #[serde(default)]
    pub continue_analysis: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Completed feedback round-trips; bounds the feedback loop.
    #[serde(default)]
    pub feedback_rounds: u32,
}

impl WorkflowState {
    pub fn new(request_text: impl Into<String>) -> Self {
        Self {
            request_text: request_text.into(),
            ..Self::default()
        }
    }

    /// Reset per-round outputs for another pass through the analysis
    /// pipeline. The original request text and intent are kept.
    pub fn reset_for_reanalysis(&mut self) {
        self.strategies.clear();
        self.execution_plan = ExecutionPlan::default();
        self.execution_results.clear();
        self.summary = None;
        self.final_response = None;
        self.continue_analysis = false;
    }

    /// True when every executed step succeeded and at least one ran.
    pub fn all_steps_succeeded(&self) -> bool {
        !self.execution_results.is_empty() && self.execution_results.iter().all(|r| r.success)
    }
}
