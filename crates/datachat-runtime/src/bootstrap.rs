//! Process-level startup helpers.

use std::path::Path;
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

use datachat_config::{load_config, ObservabilityConfig};

use crate::engine::{Engine, EngineError};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Install the global tracing subscriber once. `RUST_LOG` overrides the
/// configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// Load config from a YAML file, install tracing and build the engine.
pub fn engine_from_config_path(path: impl AsRef<Path>) -> Result<Engine, EngineError> {
    let config = load_config(path.as_ref())?;
    init_tracing(&config.observability);
    Engine::from_config(&config)
}
