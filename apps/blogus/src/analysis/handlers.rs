//! Axum route handlers for the analysis API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::analysis::records::{Fragment, Log, PromptAnalysis, Test};
use crate::errors::AppError;
use crate::llm_client::registry::{JudgeModel, ModelId, Provider, TargetModel, ALL_MODELS};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Body shared by every judge-backed endpoint. Omitted models fall back to
/// the configured defaults; an omitted goal is inferred.
#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub judge_model: Option<String>,
    pub goal: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub prompt: String,
    pub target_model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub prompt: String,
    pub target_models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GoalResponse {
    pub goal: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub model: TargetModel,
    pub output: String,
}

#[derive(Debug, Serialize)]
pub struct CompareEntry {
    pub model: TargetModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub results: Vec<CompareEntry>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: ModelId,
    pub provider: Provider,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default_judge: JudgeModel,
    pub default_target: TargetModel,
}

fn require_prompt(prompt: &str) -> Result<(), AppError> {
    if prompt.trim().is_empty() {
        return Err(AppError::Validation("prompt cannot be empty".to_string()));
    }
    Ok(())
}

fn judge_for(state: &AppState, requested: Option<&str>) -> Result<JudgeModel, AppError> {
    match requested {
        Some(id) => Ok(JudgeModel::parse(id)?),
        None => Ok(state.config.default_judge),
    }
}

fn target_for(state: &AppState, requested: Option<&str>) -> Result<TargetModel, AppError> {
    match requested {
        Some(id) => Ok(TargetModel::parse(id)?),
        None => Ok(state.config.default_target),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/infer-goal
pub async fn handle_infer_goal(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<GoalResponse>, AppError> {
    require_prompt(&request.prompt)?;
    let judge = judge_for(&state, request.judge_model.as_deref())?;

    let goal = state.analyzer.infer_goal(&request.prompt, &judge).await?;

    Ok(Json(GoalResponse { goal }))
}

/// POST /api/v1/analyze-prompt
pub async fn handle_analyze_prompt(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<PromptAnalysis>, AppError> {
    require_prompt(&request.prompt)?;
    let judge = judge_for(&state, request.judge_model.as_deref())?;

    let analysis = state
        .analyzer
        .analyze_prompt(&request.prompt, &judge, request.goal.as_deref())
        .await?;

    Ok(Json(analysis))
}

/// POST /api/v1/analyze-fragments
pub async fn handle_analyze_fragments(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<Vec<Fragment>>, AppError> {
    require_prompt(&request.prompt)?;
    let judge = judge_for(&state, request.judge_model.as_deref())?;

    let fragments = state
        .analyzer
        .analyze_fragments(&request.prompt, &judge, request.goal.as_deref())
        .await?;

    Ok(Json(fragments))
}

/// POST /api/v1/analyze-logs
pub async fn handle_analyze_logs(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<Vec<Log>>, AppError> {
    require_prompt(&request.prompt)?;
    let judge = judge_for(&state, request.judge_model.as_deref())?;

    let logs = state
        .analyzer
        .analyze_logs(&request.prompt, &judge, request.goal.as_deref())
        .await?;

    Ok(Json(logs))
}

/// POST /api/v1/generate-test
pub async fn handle_generate_test(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<Test>, AppError> {
    require_prompt(&request.prompt)?;
    let judge = judge_for(&state, request.judge_model.as_deref())?;

    let test = state
        .analyzer
        .generate_test(&request.prompt, &judge, request.goal.as_deref())
        .await?;

    Ok(Json(test))
}

/// POST /api/v1/execute-prompt
///
/// Sends the prompt to the target model as-is. The output is not parsed.
pub async fn handle_execute_prompt(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, AppError> {
    require_prompt(&request.prompt)?;
    let target = target_for(&state, request.target_model.as_deref())?;

    let output = state.analyzer.execute_prompt(&request.prompt, &target).await?;

    Ok(Json(ExecuteResponse {
        model: target,
        output,
    }))
}

/// POST /api/v1/compare
///
/// Runs the prompt on every listed target model. Per-model failures are
/// reported inline; an unknown model id fails the whole request up front.
pub async fn handle_compare(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<CompareResponse>, AppError> {
    require_prompt(&request.prompt)?;
    if request.target_models.is_empty() {
        return Err(AppError::Validation(
            "target_models must list at least one model".to_string(),
        ));
    }
    let targets = request
        .target_models
        .iter()
        .map(|id| TargetModel::parse(id))
        .collect::<Result<Vec<_>, _>>()?;

    let results = state
        .analyzer
        .compare_targets(&request.prompt, &targets)
        .await
        .into_iter()
        .map(|(model, result)| match result {
            Ok(output) => CompareEntry {
                model,
                output: Some(output),
                error: None,
            },
            Err(e) => CompareEntry {
                model,
                output: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(Json(CompareResponse { results }))
}

/// GET /api/v1/models
pub async fn handle_list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: ALL_MODELS
            .iter()
            .map(|&id| ModelInfo {
                id,
                provider: id.provider(),
            })
            .collect(),
        default_judge: state.config.default_judge,
        default_target: state.config.default_target,
    })
}
