//! Summarization and chat responses, with deterministic fallbacks.

use async_trait::async_trait;
use std::fmt::Write as _;

use datachat_core::prelude::{
    ChatResponder, ExecutionResult, LanguageServiceError, Summarizer,
};

use crate::llm::{truncate_for_log, LlmClient, LlmRequest};

const MAX_OUTPUT_LOG_CHARS: usize = 2_000;

/// Prompting settings shared by the summarizer and the chat responder.
#[derive(Debug, Clone)]
pub struct SummaryPromptConfig {
    pub model: String,
    pub temperature: f32,
}

impl Default for SummaryPromptConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
        }
    }
}

/// Model-backed summarizer. A failed completion degrades to
/// [`template_summary`]; the error never leaves this type.
pub struct LlmSummarizer<C: LlmClient> {
    client: C,
    config: SummaryPromptConfig,
}

impl<C: LlmClient> LlmSummarizer<C> {
    pub fn new(client: C, config: SummaryPromptConfig) -> Self {
        Self { client, config }
    }

    fn build_prompt(&self, request: &str, results: &[ExecutionResult]) -> (String, String) {
        let system = "You summarize data analysis results for a business reader. \
                      Write a short, factual summary in plain prose. \
                      Mention failed steps explicitly. No markdown."
            .to_string();
        let mut user = format!("Original request:\n{}\n\nStep results:\n", request);
        for result in results {
            let status = if result.success { "ok" } else { "failed" };
            let _ = writeln!(user, "- step {} ({}): {}", result.step_id, result.capability_id, status);
            if let Some(summary) = result.metadata.get("summary").and_then(|v| v.as_str()) {
                let _ = writeln!(user, "  finding: {}", summary);
            }
            if let Some(output) = &result.output {
                if let Some(insights) = output.get("insights").and_then(|v| v.as_array()) {
                    for insight in insights.iter().filter_map(|i| i.as_str()) {
                        let _ = writeln!(user, "  insight: {}", insight);
                    }
                }
            }
            if let Some(error) = &result.error {
                let _ = writeln!(user, "  error: {}", error);
            }
        }
        (system, user)
    }
}

#[async_trait]
impl<C: LlmClient> Summarizer for LlmSummarizer<C> {
    async fn summarize(
        &self,
        request: &str,
        results: &[ExecutionResult],
    ) -> Result<String, LanguageServiceError> {
        let (system, user) = self.build_prompt(request, results);
        match self
            .client
            .complete(LlmRequest {
                system,
                user,
                model: self.config.model.clone(),
                temperature: self.config.temperature,
            })
            .await
        {
            Ok(text) => {
                if tracing::enabled!(tracing::Level::DEBUG) {
                    tracing::debug!(
                        llm_output = %truncate_for_log(&text, MAX_OUTPUT_LOG_CHARS),
                        "summary raw llm output"
                    );
                }
                Ok(text.trim().to_string())
            }
            Err(err) => {
                tracing::warn!(error = %err, "summarizer model failed, using template");
                Ok(template_summary(request, results))
            }
        }
    }
}

/// Deterministic summarizer used when no model is configured.
pub struct TemplateSummarizer;

#[async_trait]
impl Summarizer for TemplateSummarizer {
    async fn summarize(
        &self,
        request: &str,
        results: &[ExecutionResult],
    ) -> Result<String, LanguageServiceError> {
        Ok(template_summary(request, results))
    }
}

/// Fixed-form summary: success rate, per-step findings, failed steps named.
pub fn template_summary(request: &str, results: &[ExecutionResult]) -> String {
    let total = results.len();
    let succeeded = results.iter().filter(|r| r.success).count();
    let mut summary = format!(
        "Analysis for \"{}\": {} of {} steps completed.",
        request, succeeded, total
    );
    for result in results.iter().filter(|r| r.success) {
        if let Some(finding) = result.metadata.get("summary").and_then(|v| v.as_str()) {
            let _ = write!(summary, " {}: {}.", result.capability_id, finding);
        }
    }
    let failed: Vec<&str> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.capability_id.as_str())
        .collect();
    if !failed.is_empty() {
        let _ = write!(summary, " Not analyzed: {}.", failed.join(", "));
    }
    summary
}

/// Model-backed conversational responder. Failures propagate so the workflow
/// can substitute its canned reply.
pub struct LlmChatResponder<C: LlmClient> {
    client: C,
    config: SummaryPromptConfig,
}

impl<C: LlmClient> LlmChatResponder<C> {
    pub fn new(client: C, config: SummaryPromptConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl<C: LlmClient> ChatResponder for LlmChatResponder<C> {
    async fn respond(&self, text: &str) -> Result<String, LanguageServiceError> {
        self.client
            .complete(LlmRequest {
                system: "You are a concise assistant for a data analysis tool. \
                         Answer briefly; suggest analyses the tool can run when relevant."
                    .to_string(),
                user: text.to_string(),
                model: self.config.model.clone(),
                temperature: self.config.temperature,
            })
            .await
            .map(|t| t.trim().to_string())
            .map_err(|e| LanguageServiceError::Backend(e.to_string()))
    }
}

/// Fixed-reply responder for model-free deployments.
pub struct StaticChatResponder {
    pub reply: String,
}

impl Default for StaticChatResponder {
    fn default() -> Self {
        Self {
            reply: "I can help you explore and analyze your datasets. \
                    Ask me about the data you have loaded."
                .to_string(),
        }
    }
}

#[async_trait]
impl ChatResponder for StaticChatResponder {
    async fn respond(&self, _text: &str) -> Result<String, LanguageServiceError> {
        Ok(self.reply.clone())
    }
}
