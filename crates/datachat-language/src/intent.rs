//! Two-tier intent classification.
//!
//! Tier one asks the language model for a strict JSON verdict; tier two is a
//! deterministic keyword classifier. Any failure in tier one (transport,
//! missing JSON, unknown fields) drops to tier two, and the chosen tier stays
//! visible on `ClassifiedIntent.source`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Write as _;

use datachat_core::prelude::{
    AnalysisRequest, CapabilityDescriptor, ClassifiedIntent, IntentClassifier, IntentKind,
    IntentSource, LanguageServiceError,
};

use crate::llm::{extract_json, truncate_for_log, LlmClient, LlmRequest};

const MAX_OUTPUT_LOG_CHARS: usize = 2_000;

const ANALYSIS_KEYWORDS: [&str; 10] = [
    "analyze",
    "analysis",
    "trend",
    "compare",
    "comparison",
    "year-over-year",
    "yoy",
    "segment",
    "distribution",
    "insight",
];

const QUERY_KEYWORDS: [&str; 8] = [
    "how many", "top", "list", "show me", "which", "count", "query", "total",
];

const SALES_KEYWORDS: [&str; 7] = [
    "sales", "brand", "model", "region", "fuel", "volume", "revenue",
];

const DESCRIBE_KEYWORDS: [&str; 7] = [
    "describe", "schema", "field", "column", "overview", "what data", "structure",
];

/// Prompting settings for the model-backed tier.
#[derive(Debug, Clone)]
pub struct IntentPromptConfig {
    pub model: String,
    pub temperature: f32,
}

impl Default for IntentPromptConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
        }
    }
}

/// Shape the model is asked to return.
#[derive(Debug, Deserialize)]
struct IntentReply {
    intent: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    execution_order: Vec<String>,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    target: String,
}

/// Model-backed classifier with the rule tier as its safety net.
pub struct LlmIntentClassifier<C: LlmClient> {
    client: C,
    config: IntentPromptConfig,
    capability_catalog: Vec<CapabilityDescriptor>,
}

impl<C: LlmClient> LlmIntentClassifier<C> {
    pub fn new(client: C, config: IntentPromptConfig) -> Self {
        Self {
            client,
            config,
            capability_catalog: Vec::new(),
        }
    }

    /// Descriptors to advertise in the prompt's capability catalog.
    pub fn with_capability_catalog(mut self, catalog: Vec<CapabilityDescriptor>) -> Self {
        self.capability_catalog = catalog;
        self
    }

    fn build_prompt(&self, text: &str) -> (String, String) {
        let mut system = String::from(
            "You classify analytical requests over tabular datasets. \
             Return ONLY one valid JSON object, no prose.\n\nShape:\n",
        );
        system.push_str(
            r#"{"intent":"direct_query|analysis|chat","confidence":0.0,"reason":"...","capabilities":["id"],"execution_order":["id"],"parameters":{},"target":"short label"}"#,
        );
        system.push_str("\n\nRules:\n");
        system.push_str("1) intent is analysis only when multiple analytical steps are useful.\n");
        system.push_str("2) direct_query is a single lookup answerable by one capability.\n");
        system.push_str("3) chat means no data access is needed.\n");
        system.push_str("4) capabilities may only use ids from the Capability Catalog.\n");
        if !self.capability_catalog.is_empty() {
            system.push_str("\nCapability Catalog:\n");
            for descriptor in &self.capability_catalog {
                let _ = writeln!(
                    system,
                    "- id: {}\n  name: {}\n  description: {}",
                    descriptor.id, descriptor.name, descriptor.description
                );
            }
        }
        let user = format!("Request:\n{}\n\nReturn JSON only.\n", text);
        (system, user)
    }

    async fn classify_with_model(&self, text: &str) -> Result<ClassifiedIntent, String> {
        let (system, user) = self.build_prompt(text);
        let output = self
            .client
            .complete(LlmRequest {
                system,
                user,
                model: self.config.model.clone(),
                temperature: self.config.temperature,
            })
            .await
            .map_err(|e| e.to_string())?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                llm_output = %truncate_for_log(&output, MAX_OUTPUT_LOG_CHARS),
                "intent raw llm output"
            );
        }
        let json = extract_json(&output).ok_or("output contained no JSON")?;
        let reply: IntentReply =
            serde_json::from_str(&json).map_err(|e| format!("invalid intent JSON: {}", e))?;
        let kind = match reply.intent.as_str() {
            "direct_query" => IntentKind::DirectQuery,
            "analysis" => IntentKind::Analysis,
            "chat" => IntentKind::Chat,
            other => return Err(format!("unknown intent '{}'", other)),
        };
        let mut intent = ClassifiedIntent::new(kind, IntentSource::Language)
            .with_confidence(reply.confidence.clamp(0.0, 1.0))
            .with_reason(reply.reason);
        if kind != IntentKind::Chat {
            intent = intent.with_analysis_request(
                AnalysisRequest::new(reply.capabilities)
                    .with_execution_order(reply.execution_order)
                    .with_target_label(if reply.target.is_empty() {
                        text.to_string()
                    } else {
                        reply.target
                    })
                    .with_parameters(reply.parameters),
            );
        }
        Ok(intent)
    }
}

#[async_trait]
impl<C: LlmClient> IntentClassifier for LlmIntentClassifier<C> {
    async fn classify(&self, text: &str) -> Result<ClassifiedIntent, LanguageServiceError> {
        match self.classify_with_model(text).await {
            Ok(intent) => Ok(intent),
            Err(reason) => {
                tracing::warn!(reason = %reason, "model classification failed, using rule tier");
                Ok(rule_classify(text))
            }
        }
    }
}

/// Keyword-only classifier, usable standalone when no model is configured.
pub struct RuleIntentClassifier;

#[async_trait]
impl IntentClassifier for RuleIntentClassifier {
    async fn classify(&self, text: &str) -> Result<ClassifiedIntent, LanguageServiceError> {
        Ok(rule_classify(text))
    }
}

/// Deterministic keyword classification. Total: always produces an intent.
pub fn rule_classify(text: &str) -> ClassifiedIntent {
    let lowered = text.to_lowercase();
    let hits = |keywords: &[&str]| keywords.iter().filter(|k| lowered.contains(**k)).count();

    let analysis_hits = hits(&ANALYSIS_KEYWORDS);
    let query_hits = hits(&QUERY_KEYWORDS);
    let describe_hits = hits(&DESCRIBE_KEYWORDS);

    if analysis_hits > 0 {
        let capabilities = analysis_capabilities(&lowered);
        let confidence = (0.4 + 0.15 * analysis_hits as f64).min(0.9);
        return ClassifiedIntent::new(IntentKind::Analysis, IntentSource::RuleFallback)
            .with_confidence(confidence)
            .with_reason("analysis keywords matched")
            .with_analysis_request(
                AnalysisRequest::new(capabilities.clone())
                    .with_execution_order(capabilities)
                    .with_target_label(text),
            );
    }
    if query_hits > 0 || describe_hits > 0 {
        let capability = if hits(&SALES_KEYWORDS) > 0 && query_hits > 0 {
            "sales_query"
        } else {
            "data_describe"
        };
        let confidence = (0.4 + 0.15 * (query_hits + describe_hits) as f64).min(0.9);
        return ClassifiedIntent::new(IntentKind::DirectQuery, IntentSource::RuleFallback)
            .with_confidence(confidence)
            .with_reason("query keywords matched")
            .with_analysis_request(
                AnalysisRequest::new(vec![capability.to_string()]).with_target_label(text),
            );
    }
    ClassifiedIntent::new(IntentKind::Chat, IntentSource::RuleFallback)
        .with_confidence(0.3)
        .with_reason("no analytical keywords")
}

/// Pick analysis capabilities from keyword groups, most specific first.
fn analysis_capabilities(lowered: &str) -> Vec<String> {
    let mut capabilities = Vec::new();
    if ["trend", "over time", "growth"].iter().any(|k| lowered.contains(k)) {
        capabilities.push("trend_analysis".to_string());
    }
    if ["year-over-year", "yoy", "compare", "comparison"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        capabilities.push("yoy_comparison".to_string());
    }
    if ["segment", "distribution", "group by"].iter().any(|k| lowered.contains(k)) {
        capabilities.push("param_segmenter".to_string());
    }
    if SALES_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        capabilities.push("sales_query".to_string());
    }
    if capabilities.is_empty() {
        capabilities.push("data_describe".to_string());
    }
    capabilities
}
