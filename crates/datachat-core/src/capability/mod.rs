//! The capability contract: the unit of pluggable analysis logic.
//!
//! A capability never opens files or connections itself; rows come through
//! the [`DataGateway`] seam so hosts and tests can swap the storage layer.

mod gateway;

pub use gateway::{DataGateway, InMemoryGateway};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::compat::{score_compatibility, CompatibilityResult};
use crate::types::{CapabilityDescriptor, DatasetDescriptor};

/// Errors a capability can raise during preparation or analysis.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("dataset '{0}' not found")]
    DataNotFound(String),
    #[error("dataset '{dataset}' is missing field '{field}'")]
    FieldMissing { dataset: String, field: String },
    #[error("data access failed: {0}")]
    DataAccess(String),
    #[error("analysis failed: {0}")]
    Analysis(String),
}

/// Rows handed from `prepare_data` to `run`. Each row is a JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawData {
    pub rows: Vec<Value>,
    pub fields: Vec<String>,
}

impl RawData {
    pub fn new(rows: Vec<Value>, fields: Vec<String>) -> Self {
        Self { rows, fields }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Structured result of one capability run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOutput {
    /// Result rows, shape is capability-specific.
    #[serde(default)]
    pub data: Vec<Value>,
    /// Derived figures keyed by metric name.
    #[serde(default)]
    pub analysis: Value,
    /// Rendering hints for hosts that chart results.
    #[serde(default)]
    pub visualization_hints: Value,
    /// Human-readable findings, one per line of the eventual summary.
    #[serde(default)]
    pub insights: Vec<String>,
}

impl RunOutput {
    pub fn with_data(mut self, data: Vec<Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_analysis(mut self, analysis: Value) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_visualization_hints(mut self, hints: Value) -> Self {
        self.visualization_hints = hints;
        self
    }

    pub fn with_insights(mut self, insights: Vec<String>) -> Self {
        self.insights = insights;
        self
    }
}

/// One pluggable analysis implementation.
///
/// Identity and parameter metadata live in the registry's descriptor, not on
/// the instance; `id` exists for logging only. The three-phase shape
/// (prepare, run, summarize) lets the dispatcher time and fail each phase
/// separately.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Stable id, matching the descriptor this instance was registered under.
    fn id(&self) -> &str;

    /// Compatibility against a dataset. The default applies the standard
    /// scoring formula with the descriptor supplied by the registry;
    /// field-agnostic capabilities override this.
    fn compatibility(
        &self,
        descriptor: &CapabilityDescriptor,
        dataset: &DatasetDescriptor,
    ) -> CompatibilityResult {
        score_compatibility(descriptor, dataset)
    }

    /// Fetch and shape the rows this capability needs.
    async fn prepare_data(
        &self,
        dataset: &DatasetDescriptor,
        params: &Map<String, Value>,
        gateway: &Arc<dyn DataGateway>,
    ) -> Result<RawData, CapabilityError>;

    /// Run the analysis over prepared rows.
    async fn run(
        &self,
        data: RawData,
        params: &Map<String, Value>,
    ) -> Result<RunOutput, CapabilityError>;

    /// One short human-readable line about the output.
    fn summarize(&self, output: &RunOutput) -> String;
}
