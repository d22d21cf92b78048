//! Domain records produced by the analysis operations, and the builders that
//! turn validated judge output into them.
//!
//! Records are plain immutable values: built once per call, never persisted here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::parser::{AnalysisDraft, FragmentDraft, LogDraft, TestDraft};
use crate::analysis::prompts::OperationKind;
use crate::errors::AnalysisError;

/// The goal an operation ran against, and whether the judge inferred it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGoal {
    pub text: String,
    pub inferred: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentType {
    Instruction,
    Context,
    Example,
    Constraint,
}

impl FragmentType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instruction" => Some(FragmentType::Instruction),
            "context" => Some(FragmentType::Context),
            "example" => Some(FragmentType::Example),
            "constraint" => Some(FragmentType::Constraint),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FragmentType::Instruction => "instruction",
            FragmentType::Context => "context",
            FragmentType::Example => "example",
            FragmentType::Constraint => "constraint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Some(LogLevel::Info),
            "warning" | "warn" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// A section of a prompt with its goal-alignment assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    #[serde(rename = "type")]
    pub fragment_type: FragmentType,
    /// 1–5
    pub goal_alignment: u8,
    pub improvement_suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    #[serde(rename = "type")]
    pub level: LogLevel,
    pub message: String,
}

/// A generated test case. `input` keys are the prompt's `{variable}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    pub input: BTreeMap<String, String>,
    pub expected_output: String,
    /// 1–5
    pub goal_relevance: u8,
}

/// Holistic evaluation of a prompt against its goal.
///
/// `inferred_goal` is `Some` exactly when `is_goal_inferred` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptAnalysis {
    /// 1–10
    pub overall_goal_alignment: u8,
    pub suggested_improvements: Vec<String>,
    /// 1–10
    pub estimated_effectiveness: u8,
    pub inferred_goal: Option<String>,
    pub is_goal_inferred: bool,
}

impl PromptAnalysis {
    pub fn build(draft: AnalysisDraft, goal: &ResolvedGoal) -> Self {
        Self {
            overall_goal_alignment: draft.overall_goal_alignment,
            suggested_improvements: draft.suggested_improvements,
            estimated_effectiveness: draft.estimated_effectiveness,
            inferred_goal: goal.inferred.then(|| goal.text.clone()),
            is_goal_inferred: goal.inferred,
        }
    }
}

impl From<FragmentDraft> for Fragment {
    fn from(draft: FragmentDraft) -> Self {
        Self {
            text: draft.text,
            fragment_type: draft.fragment_type,
            goal_alignment: draft.goal_alignment,
            improvement_suggestion: draft.improvement_suggestion,
        }
    }
}

impl From<LogDraft> for Log {
    fn from(draft: LogDraft) -> Self {
        Self {
            level: draft.level,
            message: draft.message,
        }
    }
}

impl Test {
    /// Reconciles the judge's `input` with the prompt's placeholders: every
    /// placeholder must have a value, anything else is dropped.
    pub fn build(draft: TestDraft, placeholders: &[String], raw: &str) -> Result<Self, AnalysisError> {
        let TestDraft {
            mut input,
            expected_output,
            goal_relevance,
        } = draft;

        let mut reconciled = BTreeMap::new();
        for name in placeholders {
            let value = input.remove(name).ok_or_else(|| AnalysisError::ResponseFormat {
                operation: OperationKind::TestGeneration.label(),
                field: format!("input.{name}"),
                reason: "is missing a value for a prompt variable".to_string(),
                raw: raw.to_string(),
            })?;
            reconciled.insert(name.clone(), value);
        }

        if !input.is_empty() {
            warn!(
                "Dropping {} test input key(s) with no matching prompt variable: {:?}",
                input.len(),
                input.keys().collect::<Vec<_>>()
            );
        }

        Ok(Self {
            input: reconciled,
            expected_output,
            goal_relevance,
        })
    }
}

/// Rough check that fragments cover the prompt they came from. Logged only.
pub fn fragment_coverage(prompt: &str, fragments: &[Fragment]) -> f64 {
    let prompt_words: Vec<String> = prompt
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if prompt_words.is_empty() {
        return 1.0;
    }

    let fragment_text = fragments
        .iter()
        .map(|f| f.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let covered = prompt_words
        .iter()
        .filter(|w| fragment_text.contains(w.as_str()))
        .count();
    let coverage = covered as f64 / prompt_words.len() as f64;
    debug!("Fragment coverage: {:.2}", coverage);
    coverage
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inferred(text: &str) -> ResolvedGoal {
        ResolvedGoal {
            text: text.to_string(),
            inferred: true,
        }
    }

    fn draft(pairs: &[(&str, &str)]) -> TestDraft {
        TestDraft {
            input: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            expected_output: "Bonjour".to_string(),
            goal_relevance: 4,
        }
    }

    #[test]
    fn test_prompt_analysis_goal_invariant() {
        let scores = AnalysisDraft {
            overall_goal_alignment: 6,
            suggested_improvements: vec!["Add examples".to_string()],
            estimated_effectiveness: 5,
        };

        let from_inferred = PromptAnalysis::build(scores.clone(), &inferred("Be helpful"));
        assert!(from_inferred.is_goal_inferred);
        assert_eq!(from_inferred.inferred_goal.as_deref(), Some("Be helpful"));

        let provided = ResolvedGoal {
            text: "Be helpful".to_string(),
            inferred: false,
        };
        let from_provided = PromptAnalysis::build(scores, &provided);
        assert!(!from_provided.is_goal_inferred);
        assert_eq!(from_provided.inferred_goal, None);
    }

    #[test]
    fn test_test_build_keeps_only_placeholder_keys() {
        let test = Test::build(
            draft(&[("text", "Hello"), ("extra", "x")]),
            &["text".to_string()],
            "raw",
        )
        .unwrap();
        assert_eq!(test.input.len(), 1);
        assert_eq!(test.input["text"], "Hello");
    }

    #[test]
    fn test_test_build_without_placeholders_has_empty_input() {
        let test = Test::build(draft(&[("question", "What is AI?")]), &[], "raw").unwrap();
        assert!(test.input.is_empty());
        assert_eq!(test.goal_relevance, 4);
    }

    #[test]
    fn test_test_build_missing_placeholder_names_field() {
        let err = Test::build(draft(&[]), &["language".to_string()], "raw").unwrap_err();
        assert_eq!(err.field(), Some("input.language"));
        assert_eq!(err.raw_response(), Some("raw"));
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!(FragmentType::parse(" Instruction "), Some(FragmentType::Instruction));
        assert_eq!(FragmentType::parse("fragment type"), None);
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("debug"), None);
    }

    #[test]
    fn test_records_serialize_with_wire_names() {
        let fragment = Fragment {
            text: "You are a helpful assistant.".to_string(),
            fragment_type: FragmentType::Context,
            goal_alignment: 3,
            improvement_suggestion: "Say what help means".to_string(),
        };
        let json = serde_json::to_value(&fragment).unwrap();
        assert_eq!(json["type"], "context");
        assert_eq!(json["goal_alignment"], 3);

        let log = Log {
            level: LogLevel::Warning,
            message: "Too short".to_string(),
        };
        assert_eq!(serde_json::to_value(&log).unwrap()["type"], "warning");
    }

    #[test]
    fn test_fragment_coverage() {
        let fragments = vec![Fragment {
            text: "You are a helpful assistant.".to_string(),
            fragment_type: FragmentType::Context,
            goal_alignment: 3,
            improvement_suggestion: String::new(),
        }];
        assert!(fragment_coverage("You are a helpful assistant.", &fragments) > 0.99);
        assert!(fragment_coverage("Answer in French only.", &fragments) < 0.5);
        assert_eq!(fragment_coverage("   ", &fragments), 1.0);
    }
}
