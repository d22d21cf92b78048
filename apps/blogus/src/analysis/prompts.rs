// Meta-prompt templates sent to the judge model, one per operation kind.
//
// Every template ends with the JSON shape analysis::parser expects back for
// that kind. Change both together.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analysis::records::ResolvedGoal;
use crate::llm_client::prompts::{INFERRED_GOAL_LABEL, JSON_ONLY_INSTRUCTION, PROVIDED_GOAL_LABEL};

/// The judge-facing operations. Each has its own template and response schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GoalInference,
    Analysis,
    Fragments,
    Logs,
    TestGeneration,
}

impl OperationKind {
    pub const fn label(self) -> &'static str {
        match self {
            OperationKind::GoalInference => "goal inference",
            OperationKind::Analysis => "prompt analysis",
            OperationKind::Fragments => "fragment analysis",
            OperationKind::Logs => "log analysis",
            OperationKind::TestGeneration => "test generation",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Goal inference template. Fills: {prompt}, {json_only}
pub const GOAL_INFERENCE_TEMPLATE: &str = r#"Given the following prompt, infer the likely goal or intention of the user:

Prompt: {prompt}

Provide a concise statement of the inferred goal in one sentence as a JSON object with the key "goal" and the value being the inferred goal:
{"goal": "the inferred goal"}

{json_only}"#;

/// Overall analysis template. Fills: {goal_kind}, {prompt}, {goal_section}, {json_only}
pub const ANALYSIS_TEMPLATE: &str = r#"Analyze the following prompt for an LLM, keeping in mind the {goal_kind} goal:

Prompt: {prompt}

{goal_section}

Provide an overall analysis including:
1. Overall alignment of the prompt with the goal (1-10)
2. List of suggested improvements to better achieve the goal
3. Estimated effectiveness of the prompt in achieving the goal (1-10)

Provide your analysis in the following JSON format:
{
  "overall_goal_alignment": overall_alignment_score,
  "suggested_improvements": ["improvement1", "improvement2", ...],
  "estimated_effectiveness": effectiveness_score
}

{json_only}"#;

/// Fragment analysis template. Fills: {goal_kind}, {prompt}, {goal_section}, {json_only}
pub const FRAGMENTS_TEMPLATE: &str = r#"Analyze the following prompt for an LLM, keeping in mind the {goal_kind} goal:

Prompt: {prompt}

{goal_section}

Divide the prompt into fragments and analyze each fragment. Together the fragments should cover the whole prompt, in order. For each fragment, determine:
1. The type (instruction, context, example, or constraint)
2. How well it aligns with the goal (1-5, where 5 is perfectly aligned)
3. A suggestion for improvement to better align with the goal

Provide your analysis as a JSON array in the following format:
[
  {
    "text": "fragment text",
    "type": "instruction | context | example | constraint",
    "goal_alignment": alignment_score,
    "improvement_suggestion": "suggestion to better align with goal"
  },
  ...
]

{json_only}"#;

/// Log analysis template. Fills: {goal_kind}, {prompt}, {goal_section}, {json_only}
pub const LOGS_TEMPLATE: &str = r#"Analyze the following prompt for an LLM, keeping in mind the {goal_kind} goal:

Prompt: {prompt}

{goal_section}

Generate a list of logs (info, warnings, or errors) about the prompt. Focus on aspects that are relevant to achieving the goal. An empty list is acceptable when there is nothing to report.

Provide your analysis as a JSON array in the following format:
[
  {
    "type": "info | warning | error",
    "message": "log message relevant to achieving the goal"
  },
  ...
]

{json_only}"#;

/// Test generation template. Fills: {goal_kind}, {prompt}, {goal_section}, {variables}, {json_only}
pub const TEST_GENERATION_TEMPLATE: &str = r#"Generate a test case for the following LLM prompt, keeping in mind the {goal_kind} goal:

Prompt: {prompt}

{goal_section}

Variables found in the prompt: {variables}

Provide a test case that is relevant to achieving the goal. Use the following JSON format:
{
  "input": {
    "variable1": "value1",
    "variable2": "value2",
    ...
  },
  "expected_output": "expected output for the test case",
  "goal_relevance": relevance_score
}

The input must include a string value for every variable found in the prompt, and nothing else. If no variables were found, use an empty object for input.
The goal_relevance score should be from 1-5, where 5 means the test case is highly relevant to achieving the goal.

{json_only}"#;

const NO_GOAL_DIRECTIVE: &str =
    "Goal: none was provided. First infer the most likely goal of the prompt, then use it for the rest of this task.";

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}").expect("placeholder pattern is valid"));

/// `{variable}` placeholders in a prompt template, in first-seen order, without duplicates.
/// Only identifier-like names count, so inline JSON such as `{"label": "pos"}` is not a variable.
pub fn extract_placeholders(prompt: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in PLACEHOLDER_RE.captures_iter(prompt) {
        let name = cap[1].trim();
        if !name.is_empty() && !seen.iter().any(|s: &String| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}

/// Builds the exact text sent to the judge for `kind`.
///
/// `goal` is ignored for goal inference. For the other kinds, `None` asks the
/// judge to infer a goal itself; the orchestrators always resolve one first.
pub fn build_meta_prompt(kind: OperationKind, prompt: &str, goal: Option<&ResolvedGoal>) -> String {
    let goal_kind = match goal {
        Some(g) if g.inferred => "inferred",
        Some(_) => "provided",
        None => "inferred",
    };
    let goal_section = match goal {
        Some(g) => {
            let label = if g.inferred {
                INFERRED_GOAL_LABEL
            } else {
                PROVIDED_GOAL_LABEL
            };
            format!("{label}: {}", g.text)
        }
        None => NO_GOAL_DIRECTIVE.to_string(),
    };

    match kind {
        OperationKind::GoalInference => fill_template(
            GOAL_INFERENCE_TEMPLATE,
            &[("prompt", prompt), ("json_only", JSON_ONLY_INSTRUCTION)],
        ),
        OperationKind::Analysis => fill_template(
            ANALYSIS_TEMPLATE,
            &[
                ("goal_kind", goal_kind),
                ("prompt", prompt),
                ("goal_section", &goal_section),
                ("json_only", JSON_ONLY_INSTRUCTION),
            ],
        ),
        OperationKind::Fragments => fill_template(
            FRAGMENTS_TEMPLATE,
            &[
                ("goal_kind", goal_kind),
                ("prompt", prompt),
                ("goal_section", &goal_section),
                ("json_only", JSON_ONLY_INSTRUCTION),
            ],
        ),
        OperationKind::Logs => fill_template(
            LOGS_TEMPLATE,
            &[
                ("goal_kind", goal_kind),
                ("prompt", prompt),
                ("goal_section", &goal_section),
                ("json_only", JSON_ONLY_INSTRUCTION),
            ],
        ),
        OperationKind::TestGeneration => {
            let variables = extract_placeholders(prompt);
            let variables = if variables.is_empty() {
                "(none)".to_string()
            } else {
                variables.join(", ")
            };
            fill_template(
                TEST_GENERATION_TEMPLATE,
                &[
                    ("goal_kind", goal_kind),
                    ("prompt", prompt),
                    ("goal_section", &goal_section),
                    ("variables", &variables),
                    ("json_only", JSON_ONLY_INSTRUCTION),
                ],
            )
        }
    }
}

/// Single-pass substitution of `{name}` slots. Only the template is scanned,
/// so braces inside substituted values (user prompts are full of them) are
/// copied through untouched.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let slot = values.iter().find(|(name, _)| {
            after.starts_with(name) && after[name.len()..].starts_with('}')
        });
        match slot {
            Some((name, value)) => {
                out.push_str(value);
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provided(text: &str) -> ResolvedGoal {
        ResolvedGoal {
            text: text.to_string(),
            inferred: false,
        }
    }

    #[test]
    fn test_builder_is_deterministic() {
        let goal = provided("Translate text");
        let a = build_meta_prompt(OperationKind::Fragments, "Translate: {text}", Some(&goal));
        let b = build_meta_prompt(OperationKind::Fragments, "Translate: {text}", Some(&goal));
        assert_eq!(a, b);
    }

    #[test]
    fn test_user_prompt_is_embedded_verbatim() {
        let prompt = "Say \"hi\" to {name} and {goal}\n  keep it short";
        let out = build_meta_prompt(OperationKind::Analysis, prompt, Some(&provided("Greet")));
        assert!(out.contains(&format!("Prompt: {prompt}\n")));
        assert!(out.contains("Provided Goal: Greet"));
        assert!(out.contains("keeping in mind the provided goal"));
    }

    #[test]
    fn test_inferred_goal_is_labelled() {
        let goal = ResolvedGoal {
            text: "Help users find books".to_string(),
            inferred: true,
        };
        let out = build_meta_prompt(OperationKind::Logs, "Find books.", Some(&goal));
        assert!(out.contains("Inferred Goal: Help users find books"));
        assert!(out.contains("keeping in mind the inferred goal"));
    }

    #[test]
    fn test_missing_goal_emits_inference_directive() {
        let out = build_meta_prompt(OperationKind::Analysis, "Do X.", None);
        assert!(out.contains(NO_GOAL_DIRECTIVE));
    }

    #[test]
    fn test_every_kind_requests_json_only() {
        let goal = provided("g");
        for kind in [
            OperationKind::GoalInference,
            OperationKind::Analysis,
            OperationKind::Fragments,
            OperationKind::Logs,
            OperationKind::TestGeneration,
        ] {
            let out = build_meta_prompt(kind, "p", Some(&goal));
            assert!(out.ends_with(JSON_ONLY_INSTRUCTION), "{kind}");
            assert!(!out.contains("{json_only}"), "{kind}");
            assert!(!out.contains("{goal_section}"), "{kind}");
        }
    }

    #[test]
    fn test_schema_field_lists() {
        let goal = provided("g");
        let fragments = build_meta_prompt(OperationKind::Fragments, "p", Some(&goal));
        for field in ["\"text\"", "\"type\"", "\"goal_alignment\"", "\"improvement_suggestion\""] {
            assert!(fragments.contains(field), "{field}");
        }
        let analysis = build_meta_prompt(OperationKind::Analysis, "p", Some(&goal));
        for field in [
            "\"overall_goal_alignment\"",
            "\"suggested_improvements\"",
            "\"estimated_effectiveness\"",
        ] {
            assert!(analysis.contains(field), "{field}");
        }
    }

    #[test]
    fn test_test_generation_lists_variables() {
        let out = build_meta_prompt(
            OperationKind::TestGeneration,
            "Translate {text} into {language}. Keep {text} short.",
            Some(&provided("Translate")),
        );
        assert!(out.contains("Variables found in the prompt: text, language\n"));

        let none = build_meta_prompt(OperationKind::TestGeneration, "Hello", Some(&provided("g")));
        assert!(none.contains("Variables found in the prompt: (none)"));
    }

    #[test]
    fn test_extract_placeholders() {
        assert_eq!(
            extract_placeholders("{a} then { b } then {a} and {}"),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(extract_placeholders("no variables here").is_empty());
    }

    #[test]
    fn test_inline_json_is_not_a_placeholder() {
        assert_eq!(
            extract_placeholders(r#"Classify {text}. Reply as {"label": "pos"} or {"label": "neg"}."#),
            vec!["text".to_string()]
        );
        assert!(extract_placeholders("{1} {a-b} {two words}").is_empty());
    }

    #[test]
    fn test_fill_template_leaves_unknown_braces() {
        let out = fill_template("{\"x\": {slot}} {other}", &[("slot", "{1}")]);
        assert_eq!(out, "{\"x\": {1}} {other}");
    }
}
