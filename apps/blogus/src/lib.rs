//! Prompt analysis pipeline.
//!
//! A judge model scores a prompt against a goal, splits it into fragments,
//! reports findings as logs and writes test cases for its placeholders. The
//! same client also executes prompts on target models.

pub mod analysis;
pub mod config;
pub mod errors;
pub mod llm_client;
pub mod routes;
pub mod state;

pub use analysis::{Analyzer, OperationKind, ScorePolicy};
pub use errors::{AnalysisError, AppError};
pub use llm_client::registry::{JudgeModel, ModelId, TargetModel};
pub use llm_client::{LlmClient, Transport};
