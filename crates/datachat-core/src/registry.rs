//! Capability registry: descriptors plus lazily built instances.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::capability::Capability;
use crate::types::CapabilityDescriptor;

/// Builds a capability instance on first use.
pub type CapabilityFactory = Box<dyn Fn() -> Arc<dyn Capability> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("capability '{0}' not found")]
    CapabilityNotFound(String),
}

struct RegistryEntry {
    descriptor: CapabilityDescriptor,
    factory: CapabilityFactory,
    instance: Option<Arc<dyn Capability>>,
}

/// Registration-ordered capability registry.
///
/// Registration stores metadata and a factory; the instance is built on the
/// first `get` and cached, so repeated lookups return the same `Arc`.
/// Re-registering an id replaces the metadata and drops the cached instance.
/// Shared as `Arc<CapabilityRegistry>`; all access is serialized internally.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: Mutex<Vec<RegistryEntry>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<RegistryEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register or replace a capability.
    pub fn register(&self, descriptor: CapabilityDescriptor, factory: CapabilityFactory) {
        let mut entries = self.entries();
        if let Some(entry) = entries.iter_mut().find(|e| e.descriptor.id == descriptor.id) {
            tracing::debug!(capability_id = %descriptor.id, "capability re-registered, cached instance dropped");
            entry.descriptor = descriptor;
            entry.factory = factory;
            entry.instance = None;
            return;
        }
        tracing::debug!(capability_id = %descriptor.id, "capability registered");
        entries.push(RegistryEntry {
            descriptor,
            factory,
            instance: None,
        });
    }

    /// Resolve an instance, building and caching it on first use.
    pub fn get(&self, id: &str) -> Result<Arc<dyn Capability>, RegistryError> {
        let mut entries = self.entries();
        let entry = entries
            .iter_mut()
            .find(|e| e.descriptor.id == id)
            .ok_or_else(|| RegistryError::CapabilityNotFound(id.to_string()))?;
        if let Some(instance) = &entry.instance {
            return Ok(Arc::clone(instance));
        }
        let instance = (entry.factory)();
        entry.instance = Some(Arc::clone(&instance));
        tracing::debug!(capability_id = %id, "capability instantiated");
        Ok(instance)
    }

    /// Descriptor lookup without instantiation.
    pub fn descriptor(&self, id: &str) -> Option<CapabilityDescriptor> {
        self.entries()
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| e.descriptor.clone())
    }

    /// All descriptors in registration order.
    pub fn list(&self) -> Vec<CapabilityDescriptor> {
        self.entries().iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries().iter().any(|e| e.descriptor.id == id)
    }

    /// Registration position of an id, used as the planner's final tiebreak.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.descriptor.id == id)
    }

    /// Drop every cached instance, keeping all metadata.
    pub fn clear_instances(&self) {
        for entry in self.entries().iter_mut() {
            entry.instance = None;
        }
    }
}
