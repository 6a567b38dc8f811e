//! Conditional workflow driving a request from intent to response.
//!
//! Stages are an enum, routers are pure functions over [`WorkflowState`],
//! and every collaborator that talks to a language model sits behind a
//! trait so the machine itself stays deterministic and testable.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::capability::DataGateway;
use crate::catalog::DatasetCatalog;
use crate::executor::{build_plan, Dispatcher};
use crate::planner::StrategyPlanner;
use crate::registry::CapabilityRegistry;
use crate::types::{
    AnalysisRequest, ClassifiedIntent, ExecutionResult, IntentKind, WorkflowState,
};

/// Workflow stages. `DirectResponse` and `Terminal` are sinks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intent,
    Strategy,
    DirectQuery,
    DirectResponse,
    Planning,
    Execution,
    Summarization,
    Response,
    Feedback,
    Terminal,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Intent => "intent",
            Stage::Strategy => "strategy",
            Stage::DirectQuery => "direct_query",
            Stage::DirectResponse => "direct_response",
            Stage::Planning => "planning",
            Stage::Execution => "execution",
            Stage::Summarization => "summarization",
            Stage::Response => "response",
            Stage::Feedback => "feedback",
            Stage::Terminal => "terminal",
        };
        f.write_str(s)
    }
}

/// Failure inside a language-backed collaborator. Recovered locally by the
/// machine; it never aborts a request on its own.
#[derive(Debug, Error)]
pub enum LanguageServiceError {
    #[error("language backend error: {0}")]
    Backend(String),
    #[error("malformed language output: {0}")]
    Malformed(String),
}

/// Turns raw request text into a [`ClassifiedIntent`].
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassifiedIntent, LanguageServiceError>;
}

/// Produces prose over a finished round of execution results.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        request: &str,
        results: &[ExecutionResult],
    ) -> Result<String, LanguageServiceError>;
}

/// Answers conversational requests that touch no data.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn respond(&self, text: &str) -> Result<String, LanguageServiceError>;
}

/// Decides whether user feedback asks for another analysis round.
pub trait FeedbackJudge: Send + Sync {
    fn wants_more_analysis(&self, feedback: &str) -> bool;
}

/// Default keyword-based feedback judge.
pub struct KeywordFeedbackJudge;

const CONTINUE_KEYWORDS: [&str; 8] = [
    "more", "deeper", "again", "continue", "further", "drill", "why", "what about",
];

impl FeedbackJudge for KeywordFeedbackJudge {
    fn wants_more_analysis(&self, feedback: &str) -> bool {
        let lowered = feedback.to_lowercase();
        CONTINUE_KEYWORDS.iter().any(|k| lowered.contains(k))
    }
}

/// Route out of the intent stage.
pub fn route_after_intent(state: &WorkflowState) -> Stage {
    match state.intent.as_ref().map(|i| i.kind) {
        Some(IntentKind::DirectQuery) => Stage::DirectQuery,
        Some(IntentKind::Analysis) => Stage::Strategy,
        Some(IntentKind::Chat) | None => Stage::DirectResponse,
    }
}

/// Route out of the feedback stage.
pub fn route_after_feedback(state: &WorkflowState) -> Stage {
    if state.continue_analysis {
        Stage::Strategy
    } else {
        Stage::Terminal
    }
}

/// Language-backed collaborators the machine is wired with.
pub struct LanguageHooks {
    pub classifier: Arc<dyn IntentClassifier>,
    pub summarizer: Arc<dyn Summarizer>,
    pub responder: Arc<dyn ChatResponder>,
    pub feedback_judge: Arc<dyn FeedbackJudge>,
}

/// Tunable limits for planning and the feedback loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    pub max_strategies: usize,
    pub min_score: f64,
    pub max_feedback_loops: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_strategies: 5,
            min_score: 0.5,
            max_feedback_loops: 3,
        }
    }
}

// Generous upper bound; a full round is under ten transitions.
const MAX_TRANSITIONS: u32 = 100;

/// The request workflow. Owns no per-request state; everything lives in the
/// [`WorkflowState`] passed through `run`.
pub struct WorkflowStateMachine {
    planner: StrategyPlanner,
    dispatcher: Dispatcher,
    registry: Arc<CapabilityRegistry>,
    hooks: LanguageHooks,
    settings: WorkflowSettings,
}

impl WorkflowStateMachine {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        catalog: Arc<DatasetCatalog>,
        gateway: Arc<dyn DataGateway>,
        hooks: LanguageHooks,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            planner: StrategyPlanner::new(Arc::clone(&registry), Arc::clone(&catalog)),
            dispatcher: Dispatcher::new(Arc::clone(&registry), catalog, gateway),
            registry,
            hooks,
            settings,
        }
    }

    /// Drive a fresh request from `Intent` to a sink stage.
    pub async fn run(&self, state: &mut WorkflowState, cancel: &CancellationToken) -> Stage {
        self.drive(Stage::Intent, state, cancel).await
    }

    /// Re-enter the loop at `Feedback` after the host collected feedback.
    pub async fn resume_from_feedback(
        &self,
        state: &mut WorkflowState,
        cancel: &CancellationToken,
    ) -> Stage {
        self.drive(Stage::Feedback, state, cancel).await
    }

    async fn drive(
        &self,
        start: Stage,
        state: &mut WorkflowState,
        cancel: &CancellationToken,
    ) -> Stage {
        let mut stage = start;
        let mut transitions = 0u32;
        while stage != Stage::Terminal {
            if cancel.is_cancelled() {
                state.error_message = Some("workflow cancelled".to_string());
                return Stage::Terminal;
            }
            if transitions >= MAX_TRANSITIONS {
                tracing::error!(stage = %stage, "transition cap hit, forcing terminal");
                state.error_message = Some("workflow transition cap exceeded".to_string());
                return Stage::Terminal;
            }
            tracing::debug!(stage = %stage, "entering workflow stage");
            stage = self.step(stage, state, cancel).await;
            transitions += 1;
        }
        Stage::Terminal
    }

    async fn step(
        &self,
        stage: Stage,
        state: &mut WorkflowState,
        cancel: &CancellationToken,
    ) -> Stage {
        match stage {
            Stage::Intent => self.classify_intent(state).await,
            Stage::Strategy => {
                let request = self.analysis_request(state);
                state.strategies =
                    self.planner
                        .plan(&request, self.settings.max_strategies, self.settings.min_score);
                if state.strategies.is_empty() {
                    tracing::info!("planning exhausted, no viable strategy");
                }
                Stage::Planning
            }
            Stage::Planning => {
                state.execution_plan = build_plan(&self.registry, &state.strategies);
                Stage::Execution
            }
            Stage::Execution => {
                state.execution_results =
                    self.dispatcher.execute(&state.execution_plan, cancel).await;
                Stage::Summarization
            }
            Stage::Summarization => {
                state.summary = Some(self.summarize(state).await);
                Stage::Response
            }
            Stage::DirectQuery => {
                let request = self.analysis_request(state);
                state.strategies = self.planner.plan(&request, 1, self.settings.min_score);
                state.execution_plan = build_plan(&self.registry, &state.strategies);
                state.execution_results =
                    self.dispatcher.execute(&state.execution_plan, cancel).await;
                Stage::Response
            }
            Stage::DirectResponse => {
                let text = match self.hooks.responder.respond(&state.request_text).await {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(error = %err, "chat responder failed, using canned reply");
                        "I can help you explore and analyze your datasets. \
                         Ask me about the data you have loaded."
                            .to_string()
                    }
                };
                state.final_response = Some(text);
                Stage::Terminal
            }
            Stage::Response => {
                state.final_response = Some(self.compose_response(state));
                Stage::Feedback
            }
            Stage::Feedback => {
                let wants_more = state
                    .user_feedback
                    .as_deref()
                    .map(|f| self.hooks.feedback_judge.wants_more_analysis(f))
                    .unwrap_or(false);
                state.continue_analysis =
                    wants_more && state.feedback_rounds < self.settings.max_feedback_loops;
                let next = route_after_feedback(state);
                if next == Stage::Strategy {
                    tracing::info!(
                        round = state.feedback_rounds + 1,
                        "feedback requested another analysis round"
                    );
                    state.reset_for_reanalysis();
                    state.user_feedback = None;
                    state.feedback_rounds += 1;
                }
                next
            }
            Stage::Terminal => Stage::Terminal,
        }
    }

    async fn classify_intent(&self, state: &mut WorkflowState) -> Stage {
        match self.hooks.classifier.classify(&state.request_text).await {
            Ok(intent) => {
                tracing::info!(
                    kind = ?intent.kind,
                    source = ?intent.source,
                    confidence = intent.confidence,
                    "intent classified"
                );
                state.intent = Some(intent);
                route_after_intent(state)
            }
            Err(err) => {
                // both classifier tiers failed; this is the one fatal path
                tracing::error!(error = %err, "intent classification failed");
                state.error_message = Some(err.to_string());
                state.final_response = Some(
                    "Sorry, I could not understand that request. Please rephrase it.".to_string(),
                );
                Stage::Terminal
            }
        }
    }

    fn analysis_request(&self, state: &WorkflowState) -> AnalysisRequest {
        state
            .intent
            .as_ref()
            .and_then(|i| i.analysis_request.clone())
            .unwrap_or_else(|| {
                AnalysisRequest::default().with_target_label(state.request_text.clone())
            })
    }

    async fn summarize(&self, state: &WorkflowState) -> String {
        match self
            .hooks
            .summarizer
            .summarize(&state.request_text, &state.execution_results)
            .await
        {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!(error = %err, "summarizer failed, using basic summary");
                basic_summary(&state.execution_results)
            }
        }
    }

    fn compose_response(&self, state: &WorkflowState) -> String {
        let is_direct_query = matches!(
            state.intent.as_ref().map(|i| i.kind),
            Some(IntentKind::DirectQuery)
        );
        if is_direct_query {
            return render_query_response(&state.execution_results);
        }
        if let Some(summary) = &state.summary {
            return summary.clone();
        }
        "No analysis results are available for this request.".to_string()
    }
}

/// Deterministic last-resort summary naming failed steps.
pub fn basic_summary(results: &[ExecutionResult]) -> String {
    let total = results.len();
    let succeeded = results.iter().filter(|r| r.success).count();
    let mut summary = format!("Completed {succeeded} of {total} analysis steps.");
    let failed: Vec<&str> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.capability_id.as_str())
        .collect();
    if !failed.is_empty() {
        summary.push_str(&format!(" Not analyzed: {}.", failed.join(", ")));
    }
    summary
}

/// Render a direct-query answer from raw result rows.
fn render_query_response(results: &[ExecutionResult]) -> String {
    let mut rows: Vec<serde_json::Value> = Vec::new();
    for result in results.iter().filter(|r| r.success) {
        if let Some(output) = &result.output {
            if let Some(data) = output.get("data").and_then(|d| d.as_array()) {
                rows.extend(data.iter().cloned());
            }
        }
    }
    if rows.is_empty() {
        if let Some(err) = results.iter().find_map(|r| r.error.as_deref()) {
            return format!("The query could not be answered: {err}");
        }
        return "The query returned no rows.".to_string();
    }
    let shown: Vec<String> = rows.iter().take(5).map(|r| r.to_string()).collect();
    if rows.len() > 5 {
        format!(
            "Query returned {} rows, first 5 shown:\n{}",
            rows.len(),
            shown.join("\n")
        )
    } else {
        format!("Query returned {} rows:\n{}", rows.len(), shown.join("\n"))
    }
}
