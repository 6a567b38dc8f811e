use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dataset::DatasetKind;

/// Immutable metadata describing one registered capability.
///
/// The registry owns the descriptor; instances never mutate it. Everything the
/// planner and the dispatcher need to reason about a capability without
/// instantiating it lives here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CapabilityDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub supported_dataset_kinds: Vec<DatasetKind>,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub optional_fields: Vec<String>,
    #[serde(default)]
    pub parameter_schema: Vec<ParamSpec>,
}

impl CapabilityDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dataset_kinds(mut self, kinds: Vec<DatasetKind>) -> Self {
        self.supported_dataset_kinds = kinds;
        self
    }

    pub fn with_required_fields(mut self, fields: Vec<String>) -> Self {
        self.required_fields = fields;
        self
    }

    pub fn with_optional_fields(mut self, fields: Vec<String>) -> Self {
        self.optional_fields = fields;
        self
    }

    pub fn with_parameter_schema(mut self, schema: Vec<ParamSpec>) -> Self {
        self.parameter_schema = schema;
        self
    }

    /// Parameter spec lookup by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameter_schema.iter().find(|p| p.name == name)
    }
}

/// Declared type of a capability parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    #[serde(alias = "boolean")]
    Bool,
    List,
    Dict,
    #[serde(alias = "integer")]
    Int,
}

impl ParamType {
    /// Whether `value` matches this declared type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Bool => value.is_boolean(),
            ParamType::List => value.is_array(),
            ParamType::Dict => value.is_object(),
            ParamType::Int => value.is_i64() || value.is_u64(),
        }
    }
}

/// One entry of a capability's parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub valid_values: Option<Vec<Value>>,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default_value: None,
            valid_values: None,
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_valid_values(mut self, values: Vec<Value>) -> Self {
        self.valid_values = Some(values);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
