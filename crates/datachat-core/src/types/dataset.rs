use serde::{Deserialize, Serialize};

/// Storage family a dataset lives in. Compatibility checks match this against
/// a capability's supported kinds before looking at fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    TabularFile,
    ColumnarStore,
    QueryEngine,
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DatasetKind::TabularFile => "tabular_file",
            DatasetKind::ColumnarStore => "columnar_store",
            DatasetKind::QueryEngine => "query_engine",
        };
        f.write_str(s)
    }
}

/// Metadata for one queryable dataset known to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetDescriptor {
    pub name: String,
    pub kind: DatasetKind,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub approx_row_count: u64,
}

impl DatasetDescriptor {
    pub fn new(name: impl Into<String>, kind: DatasetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            location: String::new(),
            fields: Vec::new(),
            approx_row_count: 0,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_approx_row_count(mut self, rows: u64) -> Self {
        self.approx_row_count = rows;
        self
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}
