// Prompt analysis pipeline.
// Implements: goal inference, overall analysis, fragment analysis, log analysis,
// test generation, and raw prompt execution.
// All model calls go through llm_client; nothing here talks to a provider directly.

pub mod engine;
pub mod handlers;
pub mod parser;
pub mod prompts;
pub mod records;

pub use engine::Analyzer;
pub use parser::ScorePolicy;
pub use prompts::OperationKind;
pub use records::{Fragment, FragmentType, Log, LogLevel, PromptAnalysis, ResolvedGoal, Test};
