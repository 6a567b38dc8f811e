//! End-to-end: YAML config + JSON manifest through to a final response.

use std::io::Write;
use std::sync::Arc;

use serde_json::json;

use datachat_config::load_config;
use datachat_core::prelude::InMemoryGateway;
use datachat_runtime::Engine;

fn write_manifest(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("capabilities.json");
    let manifest = json!({
        "modules": [
            {
                "id": "data_describe",
                "name": "Data Describe",
                "description": "Dataset structure and statistics",
                "implementation_ref": "builtin.data_describe",
                "optional_fields": ["date", "value"]
            },
            {
                "id": "trend_analysis",
                "name": "Trend Analysis",
                "description": "Trend direction over time",
                "implementation_ref": "builtin.trend_analysis",
                "supported_dataset_kinds": ["tabular_file"],
                "required_fields": ["date", "value"]
            },
            {
                "id": "external_scoring",
                "name": "External Scoring",
                "implementation_ref": "plugin.external_scoring"
            }
        ]
    });
    std::fs::write(&path, serde_json::to_string_pretty(&manifest).unwrap()).unwrap();
    path
}

fn write_config(dir: &tempfile::TempDir, manifest: &std::path::Path) -> std::path::PathBuf {
    let path = dir.path().join("datachat.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        "app:\n  name: pipeline-test\nplanner:\n  max_strategies: 3\n  min_score: 0.5\nmanifest_path: {}\ndatasets:\n  - name: metrics\n    kind: tabular_file\n    fields: [date, value]\n    approx_row_count: 3\n",
        manifest.display()
    )
    .unwrap();
    path
}

#[test]
fn manifest_driven_engine_answers_an_analysis_request() {
    tokio_test::block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = write_manifest(&dir);
        let config_path = write_config(&dir, &manifest_path);
        let config = load_config(&config_path).unwrap();

        let gateway = Arc::new(InMemoryGateway::new());
        gateway.insert_table(
            "metrics",
            vec![
                json!({"date": "2024-01", "value": 10}),
                json!({"date": "2024-02", "value": 20}),
                json!({"date": "2024-03", "value": 30}),
            ],
        );
        let engine = Engine::with_gateway(&config, gateway).unwrap();

        // the unknown plugin ref was skipped, the two builtins registered
        let ids: Vec<String> = engine.registry().list().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["data_describe", "trend_analysis"]);

        let outcome = engine.process_request("analyze the trend of this metric").await;
        assert!(outcome.error.is_none());
        assert!(outcome.execution_results.iter().any(|r| r.capability_id == "trend_analysis"));
        assert!(outcome.execution_results.iter().all(|r| r.success));
        assert!(outcome.final_response.contains("steps completed"));
    });
}
