//! Core orchestration engine for analytical requests.
//!
//! The crate is deterministic and I/O-free: capabilities receive rows
//! through the [`capability::DataGateway`] seam, and language-model access
//! hides behind the [`workflow`] collaborator traits. Hosts wire the pieces
//! together through a runtime crate.

pub mod capability;
pub mod catalog;
pub mod compat;
pub mod executor;
pub mod planner;
pub mod registry;
pub mod types;
pub mod workflow;

pub mod prelude {
    pub use crate::capability::{
        Capability, CapabilityError, DataGateway, InMemoryGateway, RawData, RunOutput,
    };
    pub use crate::catalog::DatasetCatalog;
    pub use crate::compat::{score_compatibility, CompatibilityResult};
    pub use crate::executor::{build_plan, DispatchError, Dispatcher};
    pub use crate::planner::{StrategyPlanner, DEFAULT_CAPABILITY};
    pub use crate::registry::{CapabilityFactory, CapabilityRegistry, RegistryError};
    pub use crate::types::{
        AnalysisRequest, CapabilityDescriptor, ClassifiedIntent, DatasetDescriptor, DatasetKind,
        ExecutionPlan, ExecutionPlanStep, ExecutionResult, IntentKind, IntentSource, ParamSpec,
        ParamType, Strategy, WorkflowState,
    };
    pub use crate::workflow::{
        route_after_feedback, route_after_intent, ChatResponder, FeedbackJudge, IntentClassifier,
        KeywordFeedbackJudge, LanguageHooks, LanguageServiceError, Stage, Summarizer,
        WorkflowSettings, WorkflowStateMachine,
    };
}
