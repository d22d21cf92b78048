pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/models", get(handlers::handle_list_models))
        // Judge-backed analysis
        .route("/api/v1/infer-goal", post(handlers::handle_infer_goal))
        .route("/api/v1/analyze-prompt", post(handlers::handle_analyze_prompt))
        .route(
            "/api/v1/analyze-fragments",
            post(handlers::handle_analyze_fragments),
        )
        .route("/api/v1/analyze-logs", post(handlers::handle_analyze_logs))
        .route("/api/v1/generate-test", post(handlers::handle_generate_test))
        // Target execution
        .route("/api/v1/execute-prompt", post(handlers::handle_execute_prompt))
        .route("/api/v1/compare", post(handlers::handle_compare))
        .with_state(state)
}
