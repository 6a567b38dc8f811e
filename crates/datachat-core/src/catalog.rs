//! Dataset catalog: the planner's view of what data exists.

use std::sync::{Mutex, MutexGuard};

use crate::types::DatasetDescriptor;

/// In-memory, insertion-ordered dataset catalog. Shared as
/// `Arc<DatasetCatalog>` next to the registry.
#[derive(Default)]
pub struct DatasetCatalog {
    datasets: Mutex<Vec<DatasetDescriptor>>,
}

impl DatasetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn datasets(&self) -> MutexGuard<'_, Vec<DatasetDescriptor>> {
        match self.datasets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add or replace a dataset by name.
    pub fn add(&self, dataset: DatasetDescriptor) {
        let mut datasets = self.datasets();
        if let Some(existing) = datasets.iter_mut().find(|d| d.name == dataset.name) {
            *existing = dataset;
        } else {
            datasets.push(dataset);
        }
    }

    pub fn get(&self, name: &str) -> Option<DatasetDescriptor> {
        self.datasets().iter().find(|d| d.name == name).cloned()
    }

    pub fn list(&self) -> Vec<DatasetDescriptor> {
        self.datasets().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DatasetKind;

    #[test]
    fn add_replaces_by_name_keeping_order() {
        let catalog = DatasetCatalog::new();
        catalog.add(DatasetDescriptor::new("a", DatasetKind::TabularFile));
        catalog.add(DatasetDescriptor::new("b", DatasetKind::QueryEngine));
        catalog.add(DatasetDescriptor::new("a", DatasetKind::ColumnarStore));

        let listed = catalog.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "a");
        assert_eq!(listed[0].kind, DatasetKind::ColumnarStore);
        assert_eq!(catalog.get("b").unwrap().kind, DatasetKind::QueryEngine);
        assert!(catalog.get("c").is_none());
    }
}
