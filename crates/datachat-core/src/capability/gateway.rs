use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{CapabilityError, RawData};
use crate::types::DatasetDescriptor;

/// Storage seam between capabilities and wherever rows actually live.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Fetch all rows of `dataset` as JSON objects.
    async fn fetch(&self, dataset: &DatasetDescriptor) -> Result<RawData, CapabilityError>;
}

/// Table-per-name in-memory gateway for tests and embedded hosts.
#[derive(Default)]
pub struct InMemoryGateway {
    tables: Mutex<HashMap<String, Vec<Value>>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&self, name: impl Into<String>, rows: Vec<Value>) {
        let mut tables = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tables.insert(name.into(), rows);
    }
}

#[async_trait]
impl DataGateway for InMemoryGateway {
    async fn fetch(&self, dataset: &DatasetDescriptor) -> Result<RawData, CapabilityError> {
        let tables = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let rows = tables
            .get(&dataset.name)
            .cloned()
            .ok_or_else(|| CapabilityError::DataNotFound(dataset.name.clone()))?;
        Ok(RawData::new(rows, dataset.fields.clone()))
    }
}
