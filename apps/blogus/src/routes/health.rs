use axum::{extract::State, Json};
use serde::Serialize;

use crate::analysis::ScorePolicy;
use crate::llm_client::registry::Provider;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// Providers with an API key; calls to the others fail fast.
    pub providers: Vec<Provider>,
    pub max_tokens: u32,
    pub score_policy: ScorePolicy,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let providers = [Provider::Anthropic, Provider::OpenAi, Provider::Groq]
        .into_iter()
        .filter(|&p| state.config.api_keys.is_configured(p))
        .collect();

    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        providers,
        max_tokens: state.analyzer.max_tokens(),
        score_policy: state.analyzer.score_policy(),
    })
}
