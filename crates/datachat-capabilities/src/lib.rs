//! Built-in analysis capabilities and their registration table.
//!
//! Implementations are bound at startup by tag: a manifest entry's
//! `implementation_ref` (for example `builtin.trend_analysis`) resolves here
//! to a concrete type. No runtime string-to-code loading happens anywhere.

mod describe;
mod sales;
mod segment;
mod trend;
mod util;
mod yoy;

pub use describe::DataDescribeCapability;
pub use sales::SalesQueryCapability;
pub use segment::ParamSegmenterCapability;
pub use trend::TrendAnalysisCapability;
pub use yoy::YoyComparisonCapability;

use std::sync::Arc;

use datachat_config::CapabilityManifest;
use datachat_core::prelude::{CapabilityDescriptor, CapabilityFactory, CapabilityRegistry};

/// Resolve an `implementation_ref` tag to a factory.
pub fn builtin_factory(reference: &str) -> Option<CapabilityFactory> {
    match reference {
        "builtin.data_describe" => Some(Box::new(|| Arc::new(DataDescribeCapability))),
        "builtin.trend_analysis" => Some(Box::new(|| Arc::new(TrendAnalysisCapability))),
        "builtin.yoy_comparison" => Some(Box::new(|| Arc::new(YoyComparisonCapability))),
        "builtin.sales_query" => Some(Box::new(|| Arc::new(SalesQueryCapability))),
        "builtin.param_segmenter" => Some(Box::new(|| Arc::new(ParamSegmenterCapability))),
        _ => None,
    }
}

/// Default descriptors for every builtin, in registration order.
pub fn builtin_descriptors() -> Vec<(CapabilityDescriptor, &'static str)> {
    vec![
        (DataDescribeCapability::descriptor(), "builtin.data_describe"),
        (TrendAnalysisCapability::descriptor(), "builtin.trend_analysis"),
        (YoyComparisonCapability::descriptor(), "builtin.yoy_comparison"),
        (SalesQueryCapability::descriptor(), "builtin.sales_query"),
        (ParamSegmenterCapability::descriptor(), "builtin.param_segmenter"),
    ]
}

/// Register all builtins with their default descriptors.
pub fn register_builtins(registry: &CapabilityRegistry) {
    for (descriptor, reference) in builtin_descriptors() {
        if let Some(factory) = builtin_factory(reference) {
            registry.register(descriptor, factory);
        }
    }
}

/// Register manifest entries, skipping those whose `implementation_ref` is
/// unknown. Returns the number actually registered.
pub fn register_from_manifest(registry: &CapabilityRegistry, manifest: &CapabilityManifest) -> usize {
    let mut registered = 0;
    for entry in &manifest.modules {
        let Some(factory) = builtin_factory(&entry.implementation_ref) else {
            tracing::warn!(
                capability_id = %entry.id,
                implementation_ref = %entry.implementation_ref,
                "unknown implementation_ref, manifest entry skipped"
            );
            continue;
        };
        registry.register(entry.descriptor(), factory);
        registered += 1;
    }
    tracing::info!(
        registered,
        total = manifest.modules.len(),
        "capability manifest applied"
    );
    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use datachat_config::ManifestEntry;
    use datachat_core::prelude::{DatasetDescriptor, DatasetKind};

    #[test]
    fn builtins_register_in_declared_order() {
        let registry = CapabilityRegistry::new();
        register_builtins(&registry);
        let ids: Vec<String> = registry.list().into_iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            vec![
                "data_describe",
                "trend_analysis",
                "yoy_comparison",
                "sales_query",
                "param_segmenter"
            ]
        );
        assert!(registry.get("trend_analysis").is_ok());
    }

    #[test]
    fn manifest_entries_with_unknown_ref_are_skipped() {
        let registry = CapabilityRegistry::new();
        let manifest = CapabilityManifest {
            modules: vec![
                ManifestEntry {
                    id: "trend_analysis".into(),
                    name: "Trend".into(),
                    description: String::new(),
                    implementation_ref: "builtin.trend_analysis".into(),
                    supported_dataset_kinds: vec![DatasetKind::TabularFile],
                    required_fields: vec!["date".into()],
                    optional_fields: vec![],
                    parameter_schema: vec![],
                },
                ManifestEntry {
                    id: "mystery".into(),
                    name: "Mystery".into(),
                    description: String::new(),
                    implementation_ref: "plugin.mystery".into(),
                    supported_dataset_kinds: vec![],
                    required_fields: vec![],
                    optional_fields: vec![],
                    parameter_schema: vec![],
                },
            ],
        };

        let registered = register_from_manifest(&registry, &manifest);
        assert_eq!(registered, 1);
        assert!(registry.contains("trend_analysis"));
        assert!(!registry.contains("mystery"));
        // the manifest descriptor overrides the builtin default
        assert_eq!(
            registry.descriptor("trend_analysis").unwrap().required_fields,
            vec!["date".to_string()]
        );
    }

    #[test]
    fn manifest_reregistration_is_idempotent() {
        let registry = CapabilityRegistry::new();
        register_builtins(&registry);
        let manifest = CapabilityManifest {
            modules: vec![ManifestEntry {
                id: "data_describe".into(),
                name: "Describe v2".into(),
                description: String::new(),
                implementation_ref: "builtin.data_describe".into(),
                supported_dataset_kinds: vec![],
                required_fields: vec![],
                optional_fields: vec![],
                parameter_schema: vec![],
            }],
        };
        register_from_manifest(&registry, &manifest);
        register_from_manifest(&registry, &manifest);

        assert_eq!(registry.list().len(), 5);
        assert_eq!(registry.descriptor("data_describe").unwrap().name, "Describe v2");
    }

    #[test]
    fn registered_describe_scores_any_dataset() {
        let registry = CapabilityRegistry::new();
        register_builtins(&registry);
        let capability = registry.get("data_describe").unwrap();
        let descriptor = registry.descriptor("data_describe").unwrap();
        let dataset = DatasetDescriptor::new("engine", DatasetKind::QueryEngine);
        let result = capability.compatibility(&descriptor, &dataset);
        assert!(result.compatible);
    }
}
