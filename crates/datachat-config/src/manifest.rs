//! Capability manifest: JSON file binding descriptors to implementations.
//!
//! The file carries a top-level `modules` array. Each entry is a full
//! capability descriptor plus an `implementation_ref` naming a tagged
//! builtin implementation; resolution happens at registration time.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use datachat_core::types::{CapabilityDescriptor, DatasetKind, ParamSpec};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapabilityManifest {
    #[serde(default)]
    pub modules: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Tag resolved against the builtin factory table, e.g.
    /// `builtin.trend_analysis`.
    pub implementation_ref: String,
    #[serde(default)]
    pub supported_dataset_kinds: Vec<DatasetKind>,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub optional_fields: Vec<String>,
    #[serde(default)]
    pub parameter_schema: Vec<ParamSpec>,
}

impl ManifestEntry {
    pub fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            supported_dataset_kinds: self.supported_dataset_kinds.clone(),
            required_fields: self.required_fields.clone(),
            optional_fields: self.optional_fields.clone(),
            parameter_schema: self.parameter_schema.clone(),
        }
    }
}

/// Load a manifest from a JSON file. Entries with an empty id are rejected
/// here; unknown `implementation_ref`s are left for registration to skip.
pub fn load_manifest(path: &Path) -> Result<CapabilityManifest, ConfigError> {
    let content = fs::read_to_string(path)?;
    let manifest: CapabilityManifest = serde_json::from_str(&content)?;
    for entry in &manifest.modules {
        if entry.id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "manifest modules[].id must not be empty".to_string(),
            ));
        }
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn manifest_parses_modules_with_schema() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
  "modules": [
    {{
      "id": "trend_analysis",
      "name": "Trend Analysis",
      "description": "Direction over time",
      "implementation_ref": "builtin.trend_analysis",
      "supported_dataset_kinds": ["tabular_file"],
      "required_fields": ["date", "value"],
      "parameter_schema": [
        {{"name": "trend_method", "type": "string", "required": true,
          "default_value": "linear",
          "valid_values": ["linear", "moving_average", "polynomial"]}}
      ]
    }}
  ]
}}"#
        )
        .unwrap();

        let manifest = load_manifest(file.path()).unwrap();
        assert_eq!(manifest.modules.len(), 1);
        let descriptor = manifest.modules[0].descriptor();
        assert_eq!(descriptor.id, "trend_analysis");
        assert_eq!(descriptor.supported_dataset_kinds, vec![DatasetKind::TabularFile]);
        let spec = descriptor.param("trend_method").unwrap();
        assert!(spec.required);
        assert_eq!(spec.default_value, Some(serde_json::json!("linear")));
    }

    #[test]
    fn empty_id_is_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"modules": [{{"id": " ", "name": "x", "implementation_ref": "builtin.x"}}]}}"#
        )
        .unwrap();
        assert!(matches!(
            load_manifest(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
