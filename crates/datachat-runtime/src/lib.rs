//! Runtime wiring for the datachat engine.
//!
//! Hosts build an [`Engine`] from a [`datachat_config::DatachatConfig`]
//! (or a YAML path via [`engine_from_config_path`]), seed a data gateway,
//! and call [`Engine::process_request`] / [`Engine::submit_feedback`].

mod bootstrap;
mod engine;

pub use bootstrap::{engine_from_config_path, init_tracing};
pub use engine::{Engine, EngineError, RequestOutcome};
