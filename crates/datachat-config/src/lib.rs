//! Unified app configuration from a single YAML file, plus the JSON
//! capability manifest loader.

pub mod manifest;

pub use manifest::{load_manifest, CapabilityManifest, ManifestEntry};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use datachat_core::types::DatasetDescriptor;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Full engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatachatConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub language: LanguageConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Datasets registered into the catalog at startup.
    #[serde(default)]
    pub datasets: Vec<DatasetDescriptor>,
    /// Optional capability manifest; builtins are registered when absent.
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,
}

fn default_version() -> u32 {
    1
}

impl Default for DatachatConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            planner: PlannerConfig::default(),
            execution: ExecutionConfig::default(),
            language: LanguageConfig::default(),
            observability: ObservabilityConfig::default(),
            datasets: Vec::new(),
            manifest_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_app_name() -> String {
    "datachat".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_environment(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_max_strategies")]
    pub max_strategies: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

fn default_max_strategies() -> usize {
    5
}

fn default_min_score() -> f64 {
    0.5
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_strategies: default_max_strategies(),
            min_score: default_min_score(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_max_feedback_loops")]
    pub max_feedback_loops: u32,
}

fn default_max_feedback_loops() -> u32 {
    3
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_feedback_loops: default_max_feedback_loops(),
        }
    }
}

/// How the language boundary is backed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LanguageMode {
    /// OpenAI-compatible endpoint with rule fallback.
    Llm,
    /// Keyword rules and template summaries only.
    #[default]
    Rules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    #[serde(default)]
    pub mode: LanguageMode,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            mode: LanguageMode::default(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Load and validate engine configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<DatachatConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: DatachatConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &DatachatConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }
    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }
    if config.planner.max_strategies == 0 {
        return Err(ConfigError::Invalid(
            "planner.max_strategies must be > 0".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.planner.min_score) {
        return Err(ConfigError::Invalid(
            "planner.min_score must be within [0, 1]".to_string(),
        ));
    }
    if config.execution.max_feedback_loops == 0 {
        return Err(ConfigError::Invalid(
            "execution.max_feedback_loops must be > 0".to_string(),
        ));
    }
    if config.language.mode == LanguageMode::Llm && config.language.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "language.endpoint must not be empty in llm mode".to_string(),
        ));
    }
    for dataset in &config.datasets {
        if dataset.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "datasets[].name must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_yaml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "app:\n  name: demo\ndatasets:\n  - name: sales\n    kind: tabular_file\n    fields: [date, value]"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.app.name, "demo");
        assert_eq!(config.planner.max_strategies, 5);
        assert_eq!(config.planner.min_score, 0.5);
        assert_eq!(config.language.mode, LanguageMode::Rules);
        assert_eq!(config.datasets.len(), 1);
        assert_eq!(config.datasets[0].fields, vec!["date", "value"]);
    }

    #[test]
    fn out_of_range_min_score_is_rejected() {
        let config = DatachatConfig {
            planner: PlannerConfig {
                min_score: 1.5,
                ..PlannerConfig::default()
            },
            ..DatachatConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("min_score"));
    }

    #[test]
    fn empty_app_name_is_rejected() {
        let config = DatachatConfig {
            app: AppConfig {
                name: "  ".to_string(),
                environment: "test".to_string(),
            },
            ..DatachatConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("app.name"));
    }

    #[test]
    fn zero_feedback_loops_is_rejected() {
        let config = DatachatConfig {
            execution: ExecutionConfig {
                max_feedback_loops: 0,
            },
            ..DatachatConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
