//! The engine: one explicit context object holding every collaborator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use datachat_capabilities::{register_builtins, register_from_manifest};
use datachat_config::{load_manifest, ConfigError, DatachatConfig, LanguageMode};
use datachat_core::prelude::{
    CapabilityRegistry, ClassifiedIntent, DataGateway, DatasetCatalog, ExecutionResult,
    InMemoryGateway, KeywordFeedbackJudge, LanguageHooks, Stage, WorkflowSettings, WorkflowState,
    WorkflowStateMachine,
};
use datachat_language::{
    HttpLlmClient, HttpLlmClientConfig, IntentPromptConfig, LlmChatResponder, LlmClient, LlmError,
    LlmIntentClassifier, LlmSummarizer, RuleIntentClassifier, StaticChatResponder,
    SummaryPromptConfig, TemplateSummarizer,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("language client error: {0}")]
    Language(#[from] LlmError),
}

/// What a caller gets back for one request or feedback round. The terminal
/// [`WorkflowState`] rides along so feedback can resume the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    pub intent: Option<ClassifiedIntent>,
    pub execution_results: Vec<ExecutionResult>,
    pub final_response: String,
    pub error: Option<String>,
    pub state: WorkflowState,
}

impl RequestOutcome {
    fn from_state(request_id: String, started_at: DateTime<Utc>, state: WorkflowState) -> Self {
        Self {
            request_id,
            started_at,
            intent: state.intent.clone(),
            execution_results: state.execution_results.clone(),
            final_response: state.final_response.clone().unwrap_or_default(),
            error: state.error_message.clone(),
            state,
        }
    }
}

/// Explicit orchestration context: registry, catalog, gateway, workflow and
/// settings, constructed once by the host and shared from there.
pub struct Engine {
    registry: Arc<CapabilityRegistry>,
    catalog: Arc<DatasetCatalog>,
    gateway: Arc<dyn DataGateway>,
    machine: WorkflowStateMachine,
    cancel: CancellationToken,
}

impl Engine {
    /// Build an engine with the default in-memory gateway.
    pub fn from_config(config: &DatachatConfig) -> Result<Self, EngineError> {
        Self::with_gateway(config, Arc::new(InMemoryGateway::new()))
    }

    /// Build an engine over a host-provided data gateway.
    pub fn with_gateway(
        config: &DatachatConfig,
        gateway: Arc<dyn DataGateway>,
    ) -> Result<Self, EngineError> {
        let registry = Arc::new(CapabilityRegistry::new());
        match &config.manifest_path {
            Some(path) => {
                let manifest = load_manifest(path)?;
                register_from_manifest(&registry, &manifest);
            }
            None => register_builtins(&registry),
        }

        let catalog = Arc::new(DatasetCatalog::new());
        for dataset in &config.datasets {
            catalog.add(dataset.clone());
        }

        let hooks = build_language_hooks(config, &registry)?;
        let settings = WorkflowSettings {
            max_strategies: config.planner.max_strategies,
            min_score: config.planner.min_score,
            max_feedback_loops: config.execution.max_feedback_loops,
        };
        let machine = WorkflowStateMachine::new(
            Arc::clone(&registry),
            Arc::clone(&catalog),
            Arc::clone(&gateway),
            hooks,
            settings,
        );
        tracing::info!(
            app = %config.app.name,
            capabilities = registry.list().len(),
            datasets = catalog.list().len(),
            mode = ?config.language.mode,
            "engine ready"
        );
        Ok(Self {
            registry,
            catalog,
            gateway,
            machine,
            cancel: CancellationToken::new(),
        })
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<DatasetCatalog> {
        &self.catalog
    }

    pub fn gateway(&self) -> &Arc<dyn DataGateway> {
        &self.gateway
    }

    /// Token cancelling all in-flight and future requests.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one request through the full workflow.
    pub async fn process_request(&self, text: &str) -> RequestOutcome {
        let request_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        tracing::info!(request_id = %request_id, "request accepted");
        let mut state = WorkflowState::new(text);
        let stage = self.machine.run(&mut state, &self.cancel).await;
        debug_assert_eq!(stage, Stage::Terminal);
        tracing::info!(
            request_id = %request_id,
            steps = state.execution_results.len(),
            has_error = state.error_message.is_some(),
            "request finished"
        );
        RequestOutcome::from_state(request_id, started_at, state)
    }

    /// Resume a finished conversation with user feedback. Re-runs the
    /// analysis pipeline when the feedback asks for more.
    pub async fn submit_feedback(&self, mut state: WorkflowState, feedback: &str) -> RequestOutcome {
        let request_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        tracing::info!(request_id = %request_id, "feedback accepted");
        state.user_feedback = Some(feedback.to_string());
        self.machine.resume_from_feedback(&mut state, &self.cancel).await;
        RequestOutcome::from_state(request_id, started_at, state)
    }
}

fn build_language_hooks(
    config: &DatachatConfig,
    registry: &Arc<CapabilityRegistry>,
) -> Result<LanguageHooks, EngineError> {
    match config.language.mode {
        LanguageMode::Rules => Ok(LanguageHooks {
            classifier: Arc::new(RuleIntentClassifier),
            summarizer: Arc::new(TemplateSummarizer),
            responder: Arc::new(StaticChatResponder::default()),
            feedback_judge: Arc::new(KeywordFeedbackJudge),
        }),
        LanguageMode::Llm => {
            let client: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(HttpLlmClientConfig {
                endpoint: config.language.endpoint.clone(),
                api_key: config.language.api_key.clone(),
                timeout_secs: config.language.timeout_secs,
            })?);
            let prompt = IntentPromptConfig {
                model: config.language.model.clone(),
                temperature: config.language.temperature,
            };
            let summary = SummaryPromptConfig {
                model: config.language.model.clone(),
                temperature: config.language.temperature,
            };
            Ok(LanguageHooks {
                classifier: Arc::new(
                    LlmIntentClassifier::new(Arc::clone(&client), prompt)
                        .with_capability_catalog(registry.list()),
                ),
                summarizer: Arc::new(LlmSummarizer::new(Arc::clone(&client), summary.clone())),
                responder: Arc::new(LlmChatResponder::new(client, summary)),
                feedback_judge: Arc::new(KeywordFeedbackJudge),
            })
        }
    }
}
