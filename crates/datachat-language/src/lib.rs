//! Language-model boundary for the datachat engine.
//!
//! Everything here degrades deterministically: classification drops to a
//! keyword tier, summaries drop to a template, and the chat responder is the
//! only collaborator whose errors reach the workflow (which substitutes a
//! canned reply).

pub mod intent;
pub mod llm;
pub mod summary;

pub use intent::{rule_classify, IntentPromptConfig, LlmIntentClassifier, RuleIntentClassifier};
pub use llm::{
    FailingLlmClient, HttpLlmClient, HttpLlmClientConfig, LlmClient, LlmError, LlmRequest,
    MockLlmClient,
};
pub use summary::{
    template_summary, LlmChatResponder, LlmSummarizer, StaticChatResponder, SummaryPromptConfig,
    TemplateSummarizer,
};
