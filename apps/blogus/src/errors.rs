use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::registry::ModelId;
use crate::llm_client::LlmError;

/// Failure of a single analysis operation.
///
/// Nothing is retried inside the pipeline; the caller decides whether to
/// re-run the operation (possibly with a different judge model).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Unknown or unusable model identifier. Raised before any model call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model invocation failed ({operation} via {model}): {source}")]
    ModelInvocation {
        model: ModelId,
        operation: &'static str,
        #[source]
        source: LlmError,
    },

    /// The judge answered, but not in the shape that was asked for.
    /// `raw` keeps the full response text for diagnostics.
    #[error("Malformed {operation} response: field '{field}' {reason}")]
    ResponseFormat {
        operation: &'static str,
        field: String,
        reason: String,
        raw: String,
    },
}

impl AnalysisError {
    /// Field named by a `ResponseFormat` error.
    pub fn field(&self) -> Option<&str> {
        match self {
            AnalysisError::ResponseFormat { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Raw judge response carried by a `ResponseFormat` error.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            AnalysisError::ResponseFormat { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// HTTP-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Analysis(AnalysisError::Configuration(msg)) => {
                (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR", msg.clone())
            }
            AppError::Analysis(e @ AnalysisError::ModelInvocation { .. }) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "The model provider call failed".to_string(),
                )
            }
            AppError::Analysis(e @ AnalysisError::ResponseFormat { raw, .. }) => {
                tracing::error!("{e}");
                tracing::debug!("Raw judge response: {raw}");
                (StatusCode::BAD_GATEWAY, "LLM_RESPONSE_FORMAT", e.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_format_accessors() {
        let err = AnalysisError::ResponseFormat {
            operation: "fragment analysis",
            field: "fragments[0].improvement_suggestion".to_string(),
            reason: "is missing".to_string(),
            raw: "[{}]".to_string(),
        };
        assert_eq!(err.field(), Some("fragments[0].improvement_suggestion"));
        assert_eq!(err.raw_response(), Some("[{}]"));
        assert!(err.to_string().contains("improvement_suggestion"));
    }

    #[test]
    fn test_status_codes() {
        let config = AppError::from(AnalysisError::Configuration("bad".into())).into_response();
        assert_eq!(config.status(), StatusCode::BAD_REQUEST);

        let invocation = AppError::from(AnalysisError::ModelInvocation {
            model: ModelId::Gpt4o,
            operation: "execution",
            source: LlmError::EmptyContent,
        })
        .into_response();
        assert_eq!(invocation.status(), StatusCode::BAD_GATEWAY);

        let validation = AppError::Validation("prompt cannot be empty".into()).into_response();
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
    }
}
