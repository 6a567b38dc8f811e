//! Core data model shared across planning, execution and the workflow loop.

mod capability;
mod dataset;
mod intent;
mod plan;
mod state;
mod strategy;

pub use capability::{CapabilityDescriptor, ParamSpec, ParamType};
pub use dataset::{DatasetDescriptor, DatasetKind};
pub use intent::{AnalysisRequest, ClassifiedIntent, IntentKind, IntentSource};
pub use plan::{ExecutionPlan, ExecutionPlanStep, ExecutionResult};
pub use state::WorkflowState;
pub use strategy::Strategy;
