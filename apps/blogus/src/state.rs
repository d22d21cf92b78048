use crate::analysis::Analyzer;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the LLM client; every handler goes through it.
    pub analyzer: Analyzer,
    pub config: Config,
}
