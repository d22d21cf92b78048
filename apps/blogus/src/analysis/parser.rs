//! Response Parser & Validator: turns judge output into validated drafts.
//!
//! Judges are asked for bare JSON but routinely wrap it in prose or code
//! fences. Extraction tries a direct parse first, then scans for the first
//! balanced `{...}` / `[...]` span that parses. Validation is strict about
//! required keys and primitive types; scores outside their documented range
//! are handled by the configured `ScorePolicy`.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::analysis::prompts::OperationKind;
use crate::analysis::records::{FragmentType, LogLevel};
use crate::errors::AnalysisError;

/// What to do with a score outside its documented range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorePolicy {
    /// Clamp to the nearest bound (judges often answer 0 or 6 on a 1–5 scale).
    #[default]
    Clamp,
    /// Fail with `ResponseFormat`.
    Reject,
}

impl FromStr for ScorePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(ScorePolicy::Clamp),
            "reject" => Ok(ScorePolicy::Reject),
            other => Err(format!("unknown score policy '{other}' (expected clamp or reject)")),
        }
    }
}

pub const FRAGMENT_SCORE_RANGE: (i64, i64) = (1, 5);
pub const TEST_SCORE_RANGE: (i64, i64) = (1, 5);
pub const ANALYSIS_SCORE_RANGE: (i64, i64) = (1, 10);

const FRAGMENT_FIELDS: &[&str] = &["text", "type", "goal_alignment", "improvement_suggestion"];
const LOG_FIELDS: &[&str] = &["type", "message"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisDraft {
    pub overall_goal_alignment: u8,
    pub suggested_improvements: Vec<String>,
    pub estimated_effectiveness: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDraft {
    pub text: String,
    pub fragment_type: FragmentType,
    pub goal_alignment: u8,
    pub improvement_suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDraft {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDraft {
    pub input: BTreeMap<String, String>,
    pub expected_output: String,
    pub goal_relevance: u8,
}

/// A judge response validated against the schema of its operation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validated {
    Goal(String),
    Analysis(AnalysisDraft),
    Fragments(Vec<FragmentDraft>),
    Logs(Vec<LogDraft>),
    Test(TestDraft),
}

/// Validates `raw` against the schema for `kind`.
pub fn parse_response(
    raw: &str,
    kind: OperationKind,
    policy: ScorePolicy,
) -> Result<Validated, AnalysisError> {
    match kind {
        OperationKind::GoalInference => parse_goal(raw).map(Validated::Goal),
        OperationKind::Analysis => parse_analysis(raw, policy).map(Validated::Analysis),
        OperationKind::Fragments => parse_fragments(raw, policy).map(Validated::Fragments),
        OperationKind::Logs => parse_logs(raw).map(Validated::Logs),
        OperationKind::TestGeneration => parse_test(raw, policy).map(Validated::Test),
    }
}

/// Goal inference answers are accepted as `{"goal": "..."}`, a JSON string,
/// or plain text.
///
/// A whole-answer JSON object must carry `goal`. JSON embedded in prose is
/// only used when it has a string `goal`; otherwise the prose is the goal.
pub fn parse_goal(raw: &str) -> Result<String, AnalysisError> {
    let v = Validator::new(OperationKind::GoalInference, raw, ScorePolicy::Clamp);

    let goal = match serde_json::from_str::<Value>(strip_json_fences(raw).trim()) {
        Ok(Value::Object(map)) => match map.get("goal") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => return Err(v.error("goal", "is missing")),
            Some(_) => return Err(v.error("goal", "must be a string")),
        },
        Ok(Value::String(s)) => s,
        _ => match extract_json(raw) {
            Some(Value::Object(map)) => match map.get("goal").and_then(Value::as_str) {
                Some(s) => s.to_string(),
                None => plain_text(raw).to_string(),
            },
            _ => plain_text(raw).to_string(),
        },
    };

    let goal = goal.trim();
    if goal.is_empty() {
        return Err(v.error("goal", "is empty"));
    }
    Ok(goal.to_string())
}

pub fn parse_analysis(raw: &str, policy: ScorePolicy) -> Result<AnalysisDraft, AnalysisError> {
    let v = Validator::new(OperationKind::Analysis, raw, policy);
    let value = v.json()?;
    let obj = v.object(&value, "$")?;

    Ok(AnalysisDraft {
        overall_goal_alignment: v.score(obj, "overall_goal_alignment", "", ANALYSIS_SCORE_RANGE)?,
        suggested_improvements: v.string_list(obj, "suggested_improvements", "")?,
        estimated_effectiveness: v.score(obj, "estimated_effectiveness", "", ANALYSIS_SCORE_RANGE)?,
    })
}

pub fn parse_fragments(raw: &str, policy: ScorePolicy) -> Result<Vec<FragmentDraft>, AnalysisError> {
    let v = Validator::new(OperationKind::Fragments, raw, policy);
    let value = v.json()?;
    let items = v.list(&value, "fragments")?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| -> Result<FragmentDraft, AnalysisError> {
            let path = format!("fragments[{i}]");
            let obj = v.object(item, &path)?;
            let extra = unknown_keys(obj, FRAGMENT_FIELDS);
            if !extra.is_empty() {
                debug!("Ignoring extra keys in {path}: {}", extra.join(", "));
            }
            let type_name = v.string(obj, "type", &path)?;
            let fragment_type = FragmentType::parse(&type_name).ok_or_else(|| {
                v.error(
                    format!("{path}.type"),
                    format!("'{type_name}' is not one of instruction, context, example, constraint"),
                )
            })?;

            Ok(FragmentDraft {
                text: v.string(obj, "text", &path)?,
                fragment_type,
                goal_alignment: v.score(obj, "goal_alignment", &path, FRAGMENT_SCORE_RANGE)?,
                improvement_suggestion: v.string(obj, "improvement_suggestion", &path)?,
            })
        })
        .collect()
}

pub fn parse_logs(raw: &str) -> Result<Vec<LogDraft>, AnalysisError> {
    let v = Validator::new(OperationKind::Logs, raw, ScorePolicy::Clamp);
    let value = v.json()?;
    let items = v.list(&value, "logs")?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| -> Result<LogDraft, AnalysisError> {
            let path = format!("logs[{i}]");
            let obj = v.object(item, &path)?;
            let extra = unknown_keys(obj, LOG_FIELDS);
            if !extra.is_empty() {
                debug!("Ignoring extra keys in {path}: {}", extra.join(", "));
            }
            let type_name = v.string(obj, "type", &path)?;
            let level = LogLevel::parse(&type_name).ok_or_else(|| {
                v.error(
                    format!("{path}.type"),
                    format!("'{type_name}' is not one of info, warning, error"),
                )
            })?;

            Ok(LogDraft {
                level,
                message: v.string(obj, "message", &path)?,
            })
        })
        .collect()
}

pub fn parse_test(raw: &str, policy: ScorePolicy) -> Result<TestDraft, AnalysisError> {
    let v = Validator::new(OperationKind::TestGeneration, raw, policy);
    let value = v.json()?;
    let obj = v.object(&value, "$")?;

    Ok(TestDraft {
        input: v.string_map(obj, "input")?,
        expected_output: v.string(obj, "expected_output", "")?,
        goal_relevance: v.score(obj, "goal_relevance", "", TEST_SCORE_RANGE)?,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// JSON extraction
// ────────────────────────────────────────────────────────────────────────────

/// Finds the JSON payload in a judge response.
///
/// 1. the whole (trimmed) text
/// 2. the first balanced `{...}` or `[...]` span that parses, scanning left
///    to right and skipping past spans that are balanced but invalid
pub fn extract_json(raw: &str) -> Option<Value> {
    let text = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let mut resume_at = 0;
    for (start, c) in text.char_indices() {
        if start < resume_at || (c != '{' && c != '[') {
            continue;
        }
        if let Some(end) = balanced_span_end(text, start) {
            match serde_json::from_str::<Value>(&text[start..end]) {
                Ok(value) => {
                    debug!("Extracted JSON from byte range {}..{} of response", start, end);
                    return Some(value);
                }
                Err(_) => resume_at = end,
            }
        }
    }
    None
}

/// End (exclusive) of the bracketed span opening at `start`, honouring JSON
/// string literals and escapes. `None` if the brackets never balance.
fn balanced_span_end(text: &str, start: usize) -> Option<usize> {
    let mut expected_closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => expected_closers.push('}'),
            '[' => expected_closers.push(']'),
            '}' | ']' => {
                if expected_closers.pop() != Some(c) {
                    return None;
                }
                if expected_closers.is_empty() {
                    return Some(start + offset + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Keys of `obj` outside `known`. They are tolerated but logged.
fn unknown_keys<'m>(obj: &'m Map<String, Value>, known: &[&str]) -> Vec<&'m str> {
    obj.keys()
        .map(String::as_str)
        .filter(|k| !known.contains(k))
        .collect()
}

fn plain_text(raw: &str) -> &str {
    let text = strip_json_fences(raw);
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

// ────────────────────────────────────────────────────────────────────────────
// Field validation
// ────────────────────────────────────────────────────────────────────────────

struct Validator<'a> {
    kind: OperationKind,
    raw: &'a str,
    policy: ScorePolicy,
}

impl<'a> Validator<'a> {
    fn new(kind: OperationKind, raw: &'a str, policy: ScorePolicy) -> Self {
        Self { kind, raw, policy }
    }

    fn error(&self, field: impl Into<String>, reason: impl Into<String>) -> AnalysisError {
        AnalysisError::ResponseFormat {
            operation: self.kind.label(),
            field: field.into(),
            reason: reason.into(),
            raw: self.raw.to_string(),
        }
    }

    fn json(&self) -> Result<Value, AnalysisError> {
        extract_json(self.raw).ok_or_else(|| self.error("$", "response contains no parseable JSON"))
    }

    fn object<'v>(&self, value: &'v Value, path: &str) -> Result<&'v Map<String, Value>, AnalysisError> {
        value
            .as_object()
            .ok_or_else(|| self.error(path, "must be a JSON object"))
    }

    /// A top-level array, or the same array wrapped as `{"<key>": [...]}`.
    fn list<'v>(&self, value: &'v Value, key: &str) -> Result<&'v Vec<Value>, AnalysisError> {
        match value {
            Value::Array(items) => Ok(items),
            Value::Object(obj) => match obj.get(key) {
                Some(Value::Array(items)) => Ok(items),
                Some(_) => Err(self.error(key, "must be a JSON array")),
                None => Err(self.error(key, "is missing")),
            },
            _ => Err(self.error("$", "must be a JSON array")),
        }
    }

    fn field<'v>(
        &self,
        obj: &'v Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Result<&'v Value, AnalysisError> {
        match obj.get(key) {
            Some(Value::Null) | None => Err(self.error(join_path(path, key), "is missing")),
            Some(value) => Ok(value),
        }
    }

    fn string(&self, obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, AnalysisError> {
        self.field(obj, key, path)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.error(join_path(path, key), "must be a string"))
    }

    fn string_list(
        &self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Result<Vec<String>, AnalysisError> {
        let field_path = join_path(path, key);
        let items = self
            .field(obj, key, path)?
            .as_array()
            .ok_or_else(|| self.error(&field_path, "must be an array of strings"))?;

        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.error(format!("{field_path}[{i}]"), "must be a string"))
            })
            .collect()
    }

    fn string_map(
        &self,
        obj: &Map<String, Value>,
        key: &str,
    ) -> Result<BTreeMap<String, String>, AnalysisError> {
        let map = self
            .field(obj, key, "")?
            .as_object()
            .ok_or_else(|| self.error(key, "must be an object of string values"))?;

        map.iter()
            .map(|(name, value)| {
                value
                    .as_str()
                    .map(|s| (name.clone(), s.to_string()))
                    .ok_or_else(|| self.error(format!("{key}.{name}"), "must be a string"))
            })
            .collect()
    }

    fn score(
        &self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
        (min, max): (i64, i64),
    ) -> Result<u8, AnalysisError> {
        let field_path = join_path(path, key);
        let value = self.field(obj, key, path)?;
        let n = value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| self.error(&field_path, "must be an integer"))?;

        if (min..=max).contains(&n) {
            return Ok(n as u8);
        }
        match self.policy {
            ScorePolicy::Clamp => {
                let clamped = n.clamp(min, max);
                warn!(
                    "{}: {} = {} is outside {}-{}, clamped to {}",
                    self.kind, field_path, n, min, max, clamped
                );
                Ok(clamped as u8)
            }
            ScorePolicy::Reject => Err(self.error(
                &field_path,
                format!("value {n} is outside the allowed range {min}-{max}"),
            )),
        }
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}
