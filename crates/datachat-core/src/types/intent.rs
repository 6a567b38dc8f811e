use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Broad category a user request resolves to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Single lookup answerable by one capability run.
    DirectQuery,
    /// Multi-step analytical request going through the strategy planner.
    Analysis,
    /// Conversational request with no data access.
    Chat,
}

/// Which tier of the classifier produced the intent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    /// The language model returned parseable JSON.
    Language,
    /// The deterministic keyword classifier stepped in.
    RuleFallback,
}

/// Outcome of intent classification, including which tier produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedIntent {
    pub kind: IntentKind,
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub analysis_request: Option<AnalysisRequest>,
    pub source: IntentSource,
}

impl ClassifiedIntent {
    pub fn new(kind: IntentKind, source: IntentSource) -> Self {
        Self {
            kind,
            confidence: 0.0,
            reason: String::new(),
            analysis_request: None,
            source,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_analysis_request(mut self, request: AnalysisRequest) -> Self {
        self.analysis_request = Some(request);
        self
    }
}

/// Planner input distilled from a classified request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Capability ids the request calls for; empty means "let the planner
    /// fall back to the default describe capability".
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    /// Preferred execution order over `required_capabilities`; ids listed
    /// here earn an order bonus during prioritization.
    #[serde(default)]
    pub execution_order: Vec<String>,
    /// Short free-text label of what the user wants, matched against
    /// capability names and descriptions.
    #[serde(default)]
    pub target_label: String,
    /// Parameters extracted from the request, passed through to candidates.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl AnalysisRequest {
    pub fn new(required_capabilities: Vec<String>) -> Self {
        Self {
            required_capabilities,
            ..Self::default()
        }
    }

    pub fn with_execution_order(mut self, order: Vec<String>) -> Self {
        self.execution_order = order;
        self
    }

    pub fn with_target_label(mut self, label: impl Into<String>) -> Self {
        self.target_label = label.into();
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }
}
